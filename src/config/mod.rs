//! Configuration management for the Lightwave bridge
//!
//! Configuration comes from a TOML file (by default under the user's config
//! directory) and is then overridden by `LIGHTWAVE_*` environment variables.

use crate::client::RemoteDevice;
use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, fmt, fs};

/// Oldest host platform version the bridge runs on
pub const DEFAULT_MIN_HOST_VERSION: &str = "3.3.0";

/// When the registration trigger is removed after a successful registration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerRemoval {
    /// Removed before the trigger's handler returns
    Inline,
    /// Scheduled on the runtime; the handler does not wait for it
    #[default]
    Deferred,
}

impl FromStr for TriggerRemoval {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "inline" => Ok(TriggerRemoval::Inline),
            "deferred" => Ok(TriggerRemoval::Deferred),
            other => Err(BridgeError::config(format!(
                "Invalid trigger removal '{other}'. Use 'inline' or 'deferred'"
            ))),
        }
    }
}

/// Bridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Lightwave account used by the vendor transport
    pub lightwave: LightwaveConfig,

    /// Host platform behavior
    pub platform: PlatformConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// In-memory backend used for offline runs
    pub simulation: SimulationConfig,
}

/// Lightwave account credentials
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LightwaveConfig {
    pub email: Option<String>,
    pub pin: Option<String>,
}

impl fmt::Debug for LightwaveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightwaveConfig")
            .field("email", &self.email)
            .field("pin", &self.pin.as_ref().map(|_| "****"))
            .finish()
    }
}

/// Host platform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Unregister every exposed device when the host shuts the bridge down
    pub unregister_on_shutdown: bool,

    /// How the registration trigger is removed after it fires
    pub trigger_removal: TriggerRemoval,

    /// Oldest supported host version (semver)
    pub min_host_version: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            unregister_on_shutdown: false,
            trigger_removal: TriggerRemoval::default(),
            min_host_version: DEFAULT_MIN_HOST_VERSION.to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable structured JSON logging
    pub json_format: bool,

    /// Log to file (path)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            file: None,
        }
    }
}

/// Seed data for the in-memory Lightwave backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Start out already authorized
    pub registered: bool,

    /// Version reported by the backend
    pub version: Option<String>,

    /// Devices the backend reports
    pub devices: Vec<RemoteDevice>,
}

impl BridgeConfig {
    /// Default configuration file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lightwave-bridge")
            .join("config.toml")
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BridgeError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` (which must exist) or from the default location (if
    /// present), then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `LIGHTWAVE_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(email) = env::var("LIGHTWAVE_EMAIL") {
            self.lightwave.email = Some(email);
        }

        if let Ok(pin) = env::var("LIGHTWAVE_PIN") {
            self.lightwave.pin = Some(pin);
        }

        if let Ok(value) = env::var("LIGHTWAVE_UNREGISTER_ON_SHUTDOWN") {
            self.platform.unregister_on_shutdown = value.parse().map_err(|_| {
                BridgeError::config(format!(
                    "Invalid LIGHTWAVE_UNREGISTER_ON_SHUTDOWN: {value}. Use 'true' or 'false'"
                ))
            })?;
        }

        if let Ok(value) = env::var("LIGHTWAVE_TRIGGER_REMOVAL") {
            self.platform.trigger_removal = value.parse()?;
        }

        if let Ok(level) = env::var("LIGHTWAVE_LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Check the configuration for values the bridge cannot run with
    pub fn validate(&self) -> Result<()> {
        semver::Version::parse(&self.platform.min_host_version).map_err(|e| {
            BridgeError::config(format!(
                "Invalid min_host_version '{}': {e}",
                self.platform.min_host_version
            ))
        })?;

        self.logging
            .level
            .parse::<tracing::Level>()
            .map_err(|_| {
                BridgeError::config(format!("Invalid log level '{}'", self.logging.level))
            })?;

        if let Some(email) = &self.lightwave.email {
            if !email.contains('@') {
                return Err(BridgeError::config(format!(
                    "Invalid Lightwave email '{email}'"
                )));
            }
        }

        if let Some(pin) = &self.lightwave.pin {
            if pin.is_empty() || !pin.chars().all(|c| c.is_ascii_digit()) {
                return Err(BridgeError::config("Lightwave PIN must be numeric"));
            }
        }

        let mut seen = HashSet::new();
        for device in &self.simulation.devices {
            if !seen.insert((device.room_id, device.device_id)) {
                return Err(BridgeError::config(format!(
                    "Duplicate simulated device {}-{}",
                    device.room_id, device.device_id
                )));
            }
        }

        Ok(())
    }
}
