//! Host lifecycle for the Lightwave bridge

use super::registration::{AuthorizationOutcome, RegistrationMachine};
use crate::client::LightwaveClient;
use crate::config::PlatformConfig;
use crate::error::{BridgeError, Result};
use crate::host::{DeviceHost, PlatformHandler};
use crate::logging::LogLevelHandle;
use async_trait::async_trait;
use semver::Version;
use std::sync::Arc;
use tracing::{info, warn, Level};

/// The bridge as the host platform sees it
pub struct LightwavePlatform {
    config: PlatformConfig,
    host: Arc<dyn DeviceHost>,
    machine: Arc<RegistrationMachine>,
    log_handle: Option<LogLevelHandle>,
}

impl LightwavePlatform {
    pub fn new(
        config: PlatformConfig,
        client: Arc<dyn LightwaveClient>,
        host: Arc<dyn DeviceHost>,
    ) -> Self {
        let machine = RegistrationMachine::new(client, host.clone(), config.trigger_removal);
        Self {
            config,
            host,
            machine,
            log_handle: None,
        }
    }

    /// Route host log level changes to the installed subscriber
    pub fn with_log_handle(mut self, handle: LogLevelHandle) -> Self {
        self.log_handle = Some(handle);
        self
    }

    pub fn machine(&self) -> &Arc<RegistrationMachine> {
        &self.machine
    }

    fn verify_host_version(&self) -> Result<()> {
        let required = Version::parse(&self.config.min_host_version).map_err(|e| {
            BridgeError::config(format!(
                "Invalid min_host_version '{}': {e}",
                self.config.min_host_version
            ))
        })?;
        let actual = self.host.version();
        let version = Version::parse(&actual).map_err(|e| {
            BridgeError::IncompatibleHost(format!("Unparseable host version '{actual}': {e}"))
        })?;

        if version < required {
            return Err(BridgeError::IncompatibleHost(format!(
                "Host version {version} is older than the required {required}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformHandler for LightwavePlatform {
    async fn on_start(&self, reason: Option<&str>) -> Result<()> {
        info!(reason = reason.unwrap_or("none"), "Starting Lightwave bridge");

        self.verify_host_version()?;
        self.machine.connect().await?;

        match self.machine.check_authorization().await? {
            AuthorizationOutcome::Authorized { report } => {
                info!(
                    exposed = report.map(|r| r.registered.len()).unwrap_or_default(),
                    "Lightwave bridge ready"
                );
            }
            AuthorizationOutcome::TriggerExposed => {
                info!("Waiting for the register button");
            }
        }
        Ok(())
    }

    async fn on_configure(&self) -> Result<()> {
        for id in self.host.registered_devices().await {
            info!(device = %id, "Configuring device");
        }
        Ok(())
    }

    async fn on_change_log_level(&self, level: Level) -> Result<()> {
        info!(%level, "Log level change requested");
        match &self.log_handle {
            Some(handle) => handle.set_level(level),
            None => {
                warn!("No reloadable logger attached; log level unchanged");
                Ok(())
            }
        }
    }

    async fn on_shutdown(&self, reason: Option<&str>) -> Result<()> {
        info!(reason = reason.unwrap_or("none"), "Shutting down Lightwave bridge");
        self.machine
            .shutdown(self.config.unregister_on_shutdown)
            .await;
        Ok(())
    }
}
