//! Command translation between bridged endpoints and Lightwave calls
//!
//! `on`/`off` forward unchanged. Level commands carry a native level that is
//! converted to a percentage before the vendor `dim` call. Each handler
//! issues exactly one vendor call and never waits for the backend to
//! confirm the new state.

use super::classifier::DeviceKind;
use super::session::{BridgeSession, BRIDGED_PRODUCT_ID, LIGHTWAVE_VENDOR_NAME};
use super::units::{to_percentage, NATIVE_LEVEL_MAX};
use crate::client::{LightwaveClient, RemoteDevice};
use crate::error::{BridgeError, Result};
use crate::host::{
    command_handler, CanonicalDeviceId, Command, CommandHandler, CommandRequest,
    DeviceDefinition, DeviceIdentity, PowerSource,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Binds canonical commands to vendor calls
#[derive(Clone)]
pub struct CommandTranslator {
    client: Arc<dyn LightwaveClient>,
}

impl CommandTranslator {
    pub fn new(client: Arc<dyn LightwaveClient>) -> Self {
        Self { client }
    }

    pub async fn turn_on(&self, device: &RemoteDevice) -> Result<()> {
        debug!(room = device.room_id, device = device.device_id, "Command on");
        self.client
            .turn_on(device)
            .await
            .map_err(|e| control_failure(device, Command::On, e))
    }

    pub async fn turn_off(&self, device: &RemoteDevice) -> Result<()> {
        debug!(room = device.room_id, device = device.device_id, "Command off");
        self.client
            .turn_off(device)
            .await
            .map_err(|e| control_failure(device, Command::Off, e))
    }

    /// Convert the native level in `request` and dim the device
    pub async fn set_level(&self, device: &RemoteDevice, request: &CommandRequest) -> Result<()> {
        let level = request.level.ok_or_else(|| {
            BridgeError::invalid_input(format!(
                "{} request for {} carries no level",
                request.command,
                device.display_name()
            ))
        })?;
        let percentage = to_percentage(level, NATIVE_LEVEL_MAX);

        info!(
            room = device.room_id,
            device = device.device_id,
            command = %request.command,
            level,
            percentage,
            transition_time = ?request.transition_time,
            "Move to level request"
        );

        self.client
            .dim(device, percentage)
            .await
            .map_err(|e| control_failure(device, request.command, e))
    }

    /// Handlers for every command the device kind supports
    pub fn handlers(&self, device: &RemoteDevice, kind: DeviceKind) -> HashMap<Command, CommandHandler> {
        let mut handlers = HashMap::new();

        let (translator, target) = (self.clone(), device.clone());
        handlers.insert(
            Command::On,
            command_handler(move |_| {
                let (translator, target) = (translator.clone(), target.clone());
                async move { translator.turn_on(&target).await }
            }),
        );

        let (translator, target) = (self.clone(), device.clone());
        handlers.insert(
            Command::Off,
            command_handler(move |_| {
                let (translator, target) = (translator.clone(), target.clone());
                async move { translator.turn_off(&target).await }
            }),
        );

        if kind == DeviceKind::Dimmer {
            let (translator, target) = (self.clone(), device.clone());
            let dim = command_handler(move |request| {
                let (translator, target) = (translator.clone(), target.clone());
                async move { translator.set_level(&target, &request).await }
            });
            handlers.insert(Command::MoveToLevel, dim.clone());
            handlers.insert(Command::MoveToLevelWithOnOff, dim);
        }

        handlers
    }

    /// Full host definition for a remote device
    pub fn definition(
        &self,
        device: &RemoteDevice,
        kind: DeviceKind,
        session: &BridgeSession,
    ) -> DeviceDefinition {
        DeviceDefinition {
            id: CanonicalDeviceId::from(device),
            identity: DeviceIdentity {
                name: device.display_name(),
                serial_number: session.serial_number(),
                vendor_id: session.vendor_id,
                vendor_name: LIGHTWAVE_VENDOR_NAME.to_string(),
                product_name: kind.product_name().to_string(),
                product_id: BRIDGED_PRODUCT_ID,
                software_version: session.software_version(),
                power_source: PowerSource::Wired,
            },
            profile: kind.profile(),
            handlers: self.handlers(device, kind),
        }
    }
}

fn control_failure(device: &RemoteDevice, command: Command, error: BridgeError) -> BridgeError {
    warn!(
        room = device.room_id,
        device = device.device_id,
        command = %command,
        error = %error,
        "Lightwave command failed"
    );
    match error {
        BridgeError::DeviceControl(_) => error,
        other => BridgeError::device_control(format!(
            "{command} failed for {}: {other}",
            device.display_name()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::memory::{ClientCall, InMemoryLightwave, Operation};
    use crate::host::CapabilityProfile;

    fn dimmer() -> RemoteDevice {
        RemoteDevice::new(1, "Lounge", 10, "Ceiling", "D")
    }

    fn setup() -> (Arc<InMemoryLightwave>, CommandTranslator) {
        let client = Arc::new(InMemoryLightwave::new());
        let translator = CommandTranslator::new(client.clone());
        (client, translator)
    }

    #[tokio::test]
    async fn test_set_level_converts_native_level() {
        let (client, translator) = setup();

        translator
            .set_level(&dimmer(), &CommandRequest::move_to_level(127))
            .await
            .unwrap();

        assert_eq!(client.calls().await, vec![ClientCall::Dim(dimmer(), 50.0)]);
    }

    #[tokio::test]
    async fn test_set_level_without_level_issues_no_call() {
        let (client, translator) = setup();
        let request = CommandRequest {
            command: Command::MoveToLevel,
            level: None,
            transition_time: None,
        };

        let err = translator.set_level(&dimmer(), &request).await.unwrap_err();

        assert!(matches!(err, BridgeError::InvalidInput(_)));
        assert!(client.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_vendor_failure_surfaces_as_device_control() {
        let (client, translator) = setup();
        client.fail(Operation::TurnOn, "no ack from link").await;

        let err = translator.turn_on(&dimmer()).await.unwrap_err();
        assert!(matches!(err, BridgeError::DeviceControl(_)));
    }

    #[tokio::test]
    async fn test_both_level_commands_route_to_dim() {
        let (client, translator) = setup();
        let handlers = translator.handlers(&dimmer(), DeviceKind::Dimmer);

        handlers[&Command::MoveToLevel](CommandRequest::move_to_level(254))
            .await
            .unwrap();
        handlers[&Command::MoveToLevelWithOnOff](CommandRequest::move_to_level_with_on_off(0))
            .await
            .unwrap();

        assert_eq!(
            client.calls().await,
            vec![
                ClientCall::Dim(dimmer(), 100.0),
                ClientCall::Dim(dimmer(), 0.0)
            ]
        );
    }

    #[test]
    fn test_switch_has_no_level_handlers() {
        let (_client, translator) = setup();
        let switch = RemoteDevice::new(1, "Lounge", 11, "Lamp", "O");
        let handlers = translator.handlers(&switch, DeviceKind::Switch);

        assert!(handlers.contains_key(&Command::On));
        assert!(handlers.contains_key(&Command::Off));
        assert!(!handlers.contains_key(&Command::MoveToLevel));
        assert!(!handlers.contains_key(&Command::MoveToLevelWithOnOff));
    }

    #[test]
    fn test_definition_metadata() {
        let (client, translator) = setup();
        let session = BridgeSession::new(client, 0xFFF1);

        let definition = translator.definition(&dimmer(), DeviceKind::Dimmer, &session);

        assert_eq!(definition.id.as_str(), "1-10");
        assert_eq!(definition.identity.name, "Lounge Ceiling");
        assert_eq!(definition.identity.vendor_name, "Lightwave");
        assert_eq!(definition.identity.product_name, "Dimmer");
        assert_eq!(definition.identity.product_id, 10000);
        assert_eq!(definition.identity.serial_number, "SN000001");
        assert_eq!(definition.profile, CapabilityProfile::DimmableLight);
    }
}
