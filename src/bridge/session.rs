//! Live connection to the vendor backend

use crate::client::LightwaveClient;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Serial number published when the backend reports no version
pub const FALLBACK_SERIAL_NUMBER: &str = "SN000001";

/// Software version published when the backend reports no version
pub const FALLBACK_SOFTWARE_VERSION: &str = "1.0.0";

/// Vendor name published for bridged lights
pub const LIGHTWAVE_VENDOR_NAME: &str = "Lightwave";

/// Product id published for every bridged endpoint
pub const BRIDGED_PRODUCT_ID: u16 = 10000;

/// Client handle plus the metadata derived when the session was opened.
/// Created on connect, dropped on shutdown.
#[derive(Clone)]
pub struct BridgeSession {
    pub client: Arc<dyn LightwaveClient>,
    pub version: Option<String>,
    pub vendor_id: u16,
    pub connected_at: DateTime<Utc>,
}

impl BridgeSession {
    pub fn new(client: Arc<dyn LightwaveClient>, vendor_id: u16) -> Self {
        let version = client.version();
        Self {
            client,
            version,
            vendor_id,
            connected_at: Utc::now(),
        }
    }

    pub fn serial_number(&self) -> String {
        self.version
            .clone()
            .unwrap_or_else(|| FALLBACK_SERIAL_NUMBER.to_string())
    }

    pub fn software_version(&self) -> String {
        self.version
            .clone()
            .unwrap_or_else(|| FALLBACK_SOFTWARE_VERSION.to_string())
    }
}

impl fmt::Debug for BridgeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeSession")
            .field("version", &self.version)
            .field("vendor_id", &self.vendor_id)
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::memory::InMemoryLightwave;

    #[test]
    fn test_metadata_falls_back_without_version() {
        let session = BridgeSession::new(Arc::new(InMemoryLightwave::new()), 0xFFF1);
        assert_eq!(session.serial_number(), FALLBACK_SERIAL_NUMBER);
        assert_eq!(session.software_version(), FALLBACK_SOFTWARE_VERSION);
    }

    #[test]
    fn test_metadata_uses_reported_version() {
        let client = InMemoryLightwave::new().with_version("2.4.1");
        let session = BridgeSession::new(Arc::new(client), 0xFFF1);
        assert_eq!(session.serial_number(), "2.4.1");
        assert_eq!(session.software_version(), "2.4.1");
    }
}
