//! In-memory host device model
//!
//! Keeps exposed endpoints in a map and lets callers actuate their handlers
//! the way a controller would. Used by the offline binary and by tests.

use super::{
    CanonicalDeviceId, CapabilityProfile, Command, CommandRequest, DeviceDefinition, DeviceHost,
    DeviceIdentity,
};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Vendor id Matter reserves for testing; used when no aggregator id is set
pub const DEFAULT_AGGREGATOR_VENDOR_ID: u16 = 0xFFF1;

struct HostedDevice {
    definition: DeviceDefinition,
    on_off: bool,
    level: Option<u8>,
}

/// Read-only view of an exposed device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    pub id: CanonicalDeviceId,
    pub identity: DeviceIdentity,
    pub profile: CapabilityProfile,
    pub commands: Vec<Command>,
    pub on_off: bool,
    pub level: Option<u8>,
}

/// In-memory host
pub struct InMemoryHost {
    devices: RwLock<HashMap<CanonicalDeviceId, HostedDevice>>,
    version: String,
    vendor_id: u16,
}

impl InMemoryHost {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            version: version.into(),
            vendor_id: DEFAULT_AGGREGATOR_VENDOR_ID,
        }
    }

    pub fn with_vendor_id(mut self, vendor_id: u16) -> Self {
        self.vendor_id = vendor_id;
        self
    }

    /// Deliver a command to an exposed device.
    ///
    /// The on/off and level attributes are updated before the handler runs
    /// and restored if it fails. The handler runs without any host lock
    /// held, so it may unregister its own device.
    pub async fn invoke(&self, id: &CanonicalDeviceId, request: CommandRequest) -> Result<()> {
        if request.command.is_level() && request.level.is_none() {
            return Err(BridgeError::invalid_input(format!(
                "{} for {id} carries no level",
                request.command
            )));
        }

        let (handler, previous) = {
            let mut devices = self.devices.write().await;
            let device = devices
                .get_mut(id)
                .ok_or_else(|| BridgeError::not_found(format!("Device {id} is not registered")))?;
            let handler = device
                .definition
                .handlers
                .get(&request.command)
                .cloned()
                .ok_or_else(|| {
                    BridgeError::not_found(format!(
                        "Device {id} has no handler for '{}'",
                        request.command
                    ))
                })?;

            let previous = (device.on_off, device.level);
            apply_attributes(device, &request);
            (handler, previous)
        };

        debug!(device = %id, command = %request.command, "Invoking handler");
        let result = handler(request).await;

        if result.is_err() {
            if let Some(device) = self.devices.write().await.get_mut(id) {
                (device.on_off, device.level) = previous;
            }
        }
        result
    }

    /// Snapshot of one exposed device
    pub async fn device(&self, id: &CanonicalDeviceId) -> Option<DeviceSnapshot> {
        self.devices.read().await.get(id).map(|device| snapshot(id, device))
    }

    /// Snapshots of every exposed device, sorted by id
    pub async fn devices(&self) -> Vec<DeviceSnapshot> {
        let devices = self.devices.read().await;
        let mut snapshots: Vec<DeviceSnapshot> = devices
            .iter()
            .map(|(id, device)| snapshot(id, device))
            .collect();
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        snapshots
    }

    /// Number of exposed devices
    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }

    /// Whether `id` is currently exposed
    pub async fn contains(&self, id: &CanonicalDeviceId) -> bool {
        self.devices.read().await.contains_key(id)
    }
}

fn apply_attributes(device: &mut HostedDevice, request: &CommandRequest) {
    match request.command {
        Command::On => device.on_off = true,
        Command::Off => device.on_off = false,
        Command::MoveToLevel => device.level = request.level,
        Command::MoveToLevelWithOnOff => {
            device.level = request.level;
            device.on_off = request.level.is_some_and(|level| level > 0);
        }
    }
}

fn snapshot(id: &CanonicalDeviceId, device: &HostedDevice) -> DeviceSnapshot {
    DeviceSnapshot {
        id: id.clone(),
        identity: device.definition.identity.clone(),
        profile: device.definition.profile,
        commands: device.definition.commands(),
        on_off: device.on_off,
        level: device.level,
    }
}

#[async_trait]
impl DeviceHost for InMemoryHost {
    async fn register_device(&self, device: DeviceDefinition) -> Result<()> {
        let missing = device.missing_commands();
        if !missing.is_empty() {
            return Err(BridgeError::registration(format!(
                "Device {} lacks handlers for {:?}",
                device.id, missing
            )));
        }

        let mut devices = self.devices.write().await;
        if devices.contains_key(&device.id) {
            return Err(BridgeError::registration(format!(
                "Device {} is already registered",
                device.id
            )));
        }

        info!(
            device = %device.id,
            name = %device.identity.name,
            profile = ?device.profile,
            device_type = device.profile.device_type_id(),
            "Registered device"
        );
        devices.insert(
            device.id.clone(),
            HostedDevice {
                definition: device,
                on_off: false,
                level: None,
            },
        );
        Ok(())
    }

    async fn unregister_device(&self, id: &CanonicalDeviceId) -> Result<()> {
        match self.devices.write().await.remove(id) {
            Some(device) => {
                info!(device = %id, name = %device.definition.identity.name, "Unregistered device");
                Ok(())
            }
            None => Err(BridgeError::not_found(format!(
                "Device {id} is not registered"
            ))),
        }
    }

    async fn set_on_off(&self, id: &CanonicalDeviceId, on: bool) -> Result<()> {
        let mut devices = self.devices.write().await;
        let device = devices
            .get_mut(id)
            .ok_or_else(|| BridgeError::not_found(format!("Device {id} is not registered")))?;
        device.on_off = on;
        Ok(())
    }

    async fn registered_devices(&self) -> Vec<CanonicalDeviceId> {
        let mut ids: Vec<CanonicalDeviceId> = self.devices.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn version(&self) -> String {
        self.version.clone()
    }

    fn aggregator_vendor_id(&self) -> u16 {
        self.vendor_id
    }
}
