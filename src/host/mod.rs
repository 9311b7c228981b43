//! Host device model
//!
//! The host (a Matter bridge aggregator) owns the exposed endpoints. The
//! bridge hands it one [`DeviceDefinition`] per device: identity metadata,
//! a capability profile and the command handlers to attach.

pub mod memory;

use crate::client::RemoteDevice;
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

/// Stable handle the host uses to address a bridged device
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalDeviceId(String);

impl CanonicalDeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&RemoteDevice> for CanonicalDeviceId {
    fn from(device: &RemoteDevice) -> Self {
        Self(format!("{}-{}", device.room_id, device.device_id))
    }
}

impl fmt::Display for CanonicalDeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Device type the endpoint is exposed as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityProfile {
    /// On/Off Light (0x0100)
    OnOffLight,
    /// Dimmable Light (0x0101)
    DimmableLight,
    /// On/Off Plug-in Unit (0x010A), used for the registration trigger
    OnOffOutlet,
}

impl CapabilityProfile {
    /// Matter device type identifier
    pub fn device_type_id(&self) -> u32 {
        match self {
            CapabilityProfile::OnOffLight => 0x0100,
            CapabilityProfile::DimmableLight => 0x0101,
            CapabilityProfile::OnOffOutlet => 0x010A,
        }
    }

    /// Commands an endpoint of this type must answer
    pub fn required_commands(&self) -> &'static [Command] {
        match self {
            CapabilityProfile::OnOffLight | CapabilityProfile::OnOffOutlet => {
                &[Command::On, Command::Off]
            }
            CapabilityProfile::DimmableLight => &[
                Command::On,
                Command::Off,
                Command::MoveToLevel,
                Command::MoveToLevelWithOnOff,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerSource {
    Wired,
}

/// Bridged device basic information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub name: String,
    pub serial_number: String,
    pub vendor_id: u16,
    pub vendor_name: String,
    pub product_name: String,
    pub product_id: u16,
    pub software_version: String,
    pub power_source: PowerSource,
}

/// Commands a bridged endpoint can receive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    On,
    Off,
    MoveToLevel,
    MoveToLevelWithOnOff,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::On => "on",
            Command::Off => "off",
            Command::MoveToLevel => "moveToLevel",
            Command::MoveToLevelWithOnOff => "moveToLevelWithOnOff",
        }
    }

    /// Whether the command carries a level payload
    pub fn is_level(&self) -> bool {
        matches!(self, Command::MoveToLevel | Command::MoveToLevelWithOnOff)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "on" => Ok(Command::On),
            "off" => Ok(Command::Off),
            "moveToLevel" => Ok(Command::MoveToLevel),
            "moveToLevelWithOnOff" => Ok(Command::MoveToLevelWithOnOff),
            other => Err(BridgeError::invalid_input(format!(
                "Unknown command '{other}'"
            ))),
        }
    }
}

/// A command as delivered by the host to a handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: Command,
    /// Native level (0..=254) for level commands
    pub level: Option<u8>,
    /// Transition time in tenths of a second, if the controller sent one
    pub transition_time: Option<u16>,
}

impl CommandRequest {
    pub fn on() -> Self {
        Self {
            command: Command::On,
            level: None,
            transition_time: None,
        }
    }

    pub fn off() -> Self {
        Self {
            command: Command::Off,
            level: None,
            transition_time: None,
        }
    }

    pub fn move_to_level(level: u8) -> Self {
        Self {
            command: Command::MoveToLevel,
            level: Some(level),
            transition_time: None,
        }
    }

    pub fn move_to_level_with_on_off(level: u8) -> Self {
        Self {
            command: Command::MoveToLevelWithOnOff,
            level: Some(level),
            transition_time: None,
        }
    }
}

/// Handler attached to one command of one endpoint
pub type CommandHandler =
    Arc<dyn Fn(CommandRequest) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Wrap an async closure as a [`CommandHandler`]
pub fn command_handler<F, Fut>(handler: F) -> CommandHandler
where
    F: Fn(CommandRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |request| handler(request).boxed())
}

/// Everything the host needs to expose one device
#[derive(Clone)]
pub struct DeviceDefinition {
    pub id: CanonicalDeviceId,
    pub identity: DeviceIdentity,
    pub profile: CapabilityProfile,
    pub handlers: HashMap<Command, CommandHandler>,
}

impl DeviceDefinition {
    /// Whether a handler is attached for `command`
    pub fn handles(&self, command: Command) -> bool {
        self.handlers.contains_key(&command)
    }

    /// Commands the profile requires but no handler answers
    pub fn missing_commands(&self) -> Vec<Command> {
        self.profile
            .required_commands()
            .iter()
            .copied()
            .filter(|command| !self.handles(*command))
            .collect()
    }

    /// Attached commands, sorted by name
    pub fn commands(&self) -> Vec<Command> {
        let mut commands: Vec<Command> = self.handlers.keys().copied().collect();
        commands.sort_by_key(|c| c.as_str());
        commands
    }
}

impl fmt::Debug for DeviceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceDefinition")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("profile", &self.profile)
            .field("commands", &self.commands())
            .finish()
    }
}

/// Trait for the host device model
#[async_trait]
pub trait DeviceHost: Send + Sync {
    /// Expose a device and attach its handlers
    async fn register_device(&self, device: DeviceDefinition) -> Result<()>;

    /// Remove a previously exposed device
    async fn unregister_device(&self, id: &CanonicalDeviceId) -> Result<()>;

    /// Update the on/off attribute of an exposed device
    async fn set_on_off(&self, id: &CanonicalDeviceId, on: bool) -> Result<()>;

    /// Ids of every currently exposed device
    async fn registered_devices(&self) -> Vec<CanonicalDeviceId>;

    /// Host platform version
    fn version(&self) -> String;

    /// Vendor id the host aggregator announces bridged devices under
    fn aggregator_vendor_id(&self) -> u16;
}

/// Lifecycle hooks the host platform calls into.
///
/// The bridge owns none of the lifecycle; it only reacts to these calls.
#[async_trait]
pub trait PlatformHandler: Send + Sync {
    /// Called once the host is ready to accept devices
    async fn on_start(&self, reason: Option<&str>) -> Result<()>;

    /// Called after start so persisted device attributes can be refreshed
    async fn on_configure(&self) -> Result<()>;

    /// Called when the operator changes the log level from the host
    async fn on_change_log_level(&self, level: tracing::Level) -> Result<()>;

    /// Called before the host stops
    async fn on_shutdown(&self, reason: Option<&str>) -> Result<()>;
}
