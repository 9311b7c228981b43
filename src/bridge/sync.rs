//! Discovery and reconciliation of Lightwave devices
//!
//! A sync exposes every remote device that is not exposed yet. Devices that
//! disappear from the backend stay registered; pruning is not done here.

use super::classifier::{classify, DeviceKind};
use super::session::BridgeSession;
use super::translator::CommandTranslator;
use crate::error::{BridgeError, Result};
use crate::host::{CanonicalDeviceId, DeviceHost};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Outcome of one sync cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    /// Devices the backend reported
    pub discovered: usize,
    /// Devices newly exposed by this cycle
    pub registered: Vec<CanonicalDeviceId>,
    /// Devices skipped because they were already exposed
    pub already_exposed: usize,
    /// Devices the host refused, with the reason
    pub failed: Vec<(CanonicalDeviceId, String)>,
}

/// Keeps the host's exposed devices in step with the vendor device list
pub struct DeviceSync {
    host: Arc<dyn DeviceHost>,
    exposed: Mutex<HashMap<CanonicalDeviceId, DeviceKind>>,
}

impl DeviceSync {
    pub fn new(host: Arc<dyn DeviceHost>) -> Self {
        Self {
            host,
            exposed: Mutex::new(HashMap::new()),
        }
    }

    /// Query the backend and expose every device not exposed yet.
    ///
    /// Concurrent calls are serialized on the exposed set, so a device is
    /// never registered twice. A query failure changes nothing.
    pub async fn sync(&self, session: &BridgeSession) -> Result<SyncReport> {
        let mut exposed = self.exposed.lock().await;

        let devices = session.client.get_devices().await.map_err(|e| match e {
            BridgeError::Discovery(_) => e,
            other => BridgeError::discovery(other.to_string()),
        })?;
        info!(count = devices.len(), "Discovered Lightwave devices");

        let translator = CommandTranslator::new(session.client.clone());
        let mut report = SyncReport {
            discovered: devices.len(),
            ..SyncReport::default()
        };

        for device in &devices {
            let id = CanonicalDeviceId::from(device);
            if exposed.contains_key(&id) {
                debug!(device = %id, "Already exposed");
                report.already_exposed += 1;
                continue;
            }

            let kind = classify(device);
            let definition = translator.definition(device, kind, session);
            match self.host.register_device(definition).await {
                Ok(()) => {
                    info!(device = %id, name = %device.display_name(), ?kind, "Exposed device");
                    exposed.insert(id.clone(), kind);
                    report.registered.push(id);
                }
                Err(e) => {
                    warn!(device = %id, error = %e, "Failed to expose device");
                    report.failed.push((id, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Exposed device ids and their kinds, sorted by id
    pub async fn exposed(&self) -> Vec<(CanonicalDeviceId, DeviceKind)> {
        let mut exposed: Vec<_> = self
            .exposed
            .lock()
            .await
            .iter()
            .map(|(id, kind)| (id.clone(), *kind))
            .collect();
        exposed.sort_by(|a, b| a.0.cmp(&b.0));
        exposed
    }

    /// Unregister every exposed device. Failures are logged and skipped;
    /// returns how many devices were released.
    pub async fn unregister_all(&self) -> usize {
        let mut exposed = self.exposed.lock().await;
        let mut released = 0;

        for (id, _) in exposed.drain() {
            match self.host.unregister_device(&id).await {
                Ok(()) => released += 1,
                Err(e) => warn!(device = %id, error = %e, "Failed to unregister device"),
            }
        }

        released
    }
}
