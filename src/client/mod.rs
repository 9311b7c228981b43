//! Lightwave vendor client abstraction
//!
//! The low-level transport (handshake, link pairing, wire format) lives
//! outside this crate. The bridge only sees the [`LightwaveClient`] trait,
//! which any transport or test double can implement.

pub mod memory;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Device type code the vendor uses for dimmable lights
pub const DIMMER_TYPE_CODE: &str = "D";

/// Lightwave device descriptor as reported by a discovery query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDevice {
    /// Room identifier
    pub room_id: u32,
    /// Room display name
    pub room_name: String,
    /// Device identifier, unique within its room
    pub device_id: u32,
    /// Device display name
    pub device_name: String,
    /// Vendor device type code (`"D"` for dimmers)
    pub device_type: String,
}

impl RemoteDevice {
    /// Create a new device descriptor
    pub fn new(
        room_id: u32,
        room_name: impl Into<String>,
        device_id: u32,
        device_name: impl Into<String>,
        device_type: impl Into<String>,
    ) -> Self {
        Self {
            room_id,
            room_name: room_name.into(),
            device_id,
            device_name: device_name.into(),
            device_type: device_type.into(),
        }
    }

    /// Name shown to controllers: room name followed by device name
    pub fn display_name(&self) -> String {
        format!("{} {}", self.room_name, self.device_name)
    }
}

/// Trait for Lightwave client implementations
#[async_trait]
pub trait LightwaveClient: Send + Sync {
    /// Open a session with the vendor backend
    async fn connect(&self) -> Result<()>;

    /// Whether this client is already authorized with the backend
    async fn is_registered(&self) -> Result<bool>;

    /// Request authorization from the backend
    async fn ensure_registration(&self) -> Result<()>;

    /// Fetch the full current device list
    async fn get_devices(&self) -> Result<Vec<RemoteDevice>>;

    /// Switch a device on
    async fn turn_on(&self, device: &RemoteDevice) -> Result<()>;

    /// Switch a device off
    async fn turn_off(&self, device: &RemoteDevice) -> Result<()>;

    /// Dim a device to a percentage in `[0, 100]`
    async fn dim(&self, device: &RemoteDevice, percentage: f64) -> Result<()>;

    /// Protocol/firmware version reported by the backend, if known
    fn version(&self) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_joins_room_and_device() {
        let device = RemoteDevice::new(1, "Kitchen", 10, "Pendant", "D");
        assert_eq!(device.display_name(), "Kitchen Pendant");
    }

    #[test]
    fn test_remote_device_uses_vendor_field_names() {
        let json = serde_json::json!({
            "roomId": 2,
            "roomName": "Hall",
            "deviceId": 4,
            "deviceName": "Lamp",
            "deviceType": "O"
        });
        let device: RemoteDevice = serde_json::from_value(json).unwrap();
        assert_eq!(device, RemoteDevice::new(2, "Hall", 4, "Lamp", "O"));
    }
}
