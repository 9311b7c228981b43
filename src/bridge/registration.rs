//! Vendor registration state machine
//!
//! ```text
//! Disconnected --connect--> ConnectedUnauthorized --trigger on--> Authorizing
//!                                  |      ^                            |
//!                    is_registered |      +------- failure ------------+
//!                                  v                                   |
//!                          ConnectedAuthorized <------- success -------+
//! ```
//!
//! While unauthorized the bridge exposes a single on/off outlet, the
//! registration trigger. Turning it on runs the vendor handshake; on success
//! the devices are synced and the trigger is removed.

use super::classifier::DeviceKind;
use super::session::{BridgeSession, BRIDGED_PRODUCT_ID, FALLBACK_SOFTWARE_VERSION};
use super::sync::{DeviceSync, SyncReport};
use crate::client::LightwaveClient;
use crate::config::TriggerRemoval;
use crate::error::{BridgeError, Result};
use crate::host::{
    command_handler, CanonicalDeviceId, CapabilityProfile, Command, DeviceDefinition, DeviceHost,
    DeviceIdentity, PowerSource,
};
use crate::log_structured_error;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Host id of the registration trigger
pub const TRIGGER_ID: &str = "registerButton1";
pub const TRIGGER_NAME: &str = "Register Button";
pub const TRIGGER_SERIAL_NUMBER: &str = "SN000002";
pub const TRIGGER_VENDOR_NAME: &str = "Matterbridge";
pub const TRIGGER_PRODUCT_NAME: &str = "Matterbridge Register Button";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RegistrationState {
    Disconnected,
    ConnectedUnauthorized,
    Authorizing,
    ConnectedAuthorized,
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistrationState::Disconnected => "disconnected",
            RegistrationState::ConnectedUnauthorized => "connected (unauthorized)",
            RegistrationState::Authorizing => "authorizing",
            RegistrationState::ConnectedAuthorized => "connected (authorized)",
        };
        f.write_str(name)
    }
}

/// Result of [`RegistrationMachine::check_authorization`]
#[derive(Debug, Clone, PartialEq)]
pub enum AuthorizationOutcome {
    /// The backend already trusts this client. `report` is `None` when the
    /// follow-up sync failed.
    Authorized { report: Option<SyncReport> },
    /// Not authorized; the registration trigger is exposed
    TriggerExposed,
}

/// Result of actuating the registration trigger
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    Authorized { report: Option<SyncReport> },
    /// Actuation arrived in a state that does not accept it
    Ignored(RegistrationState),
}

/// Drives connection, authorization and the registration trigger
pub struct RegistrationMachine {
    client: Arc<dyn LightwaveClient>,
    host: Arc<dyn DeviceHost>,
    sync: DeviceSync,
    removal: TriggerRemoval,
    state: Mutex<RegistrationState>,
    session: RwLock<Option<BridgeSession>>,
    trigger: Mutex<Option<CanonicalDeviceId>>,
    me: Weak<Self>,
}

impl RegistrationMachine {
    pub fn new(
        client: Arc<dyn LightwaveClient>,
        host: Arc<dyn DeviceHost>,
        removal: TriggerRemoval,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            client,
            sync: DeviceSync::new(host.clone()),
            host,
            removal,
            state: Mutex::new(RegistrationState::Disconnected),
            session: RwLock::new(None),
            trigger: Mutex::new(None),
            me: me.clone(),
        })
    }

    pub async fn state(&self) -> RegistrationState {
        *self.state.lock().await
    }

    /// Current session, if connected
    pub async fn session(&self) -> Option<BridgeSession> {
        self.session.read().await.clone()
    }

    /// Id of the exposed registration trigger, if any
    pub async fn trigger_id(&self) -> Option<CanonicalDeviceId> {
        self.trigger.lock().await.clone()
    }

    /// Devices exposed by syncs so far
    pub async fn exposed(&self) -> Vec<(CanonicalDeviceId, DeviceKind)> {
        self.sync.exposed().await
    }

    /// Open the vendor session. A failure leaves the machine disconnected.
    pub async fn connect(&self) -> Result<BridgeSession> {
        let mut state = self.state.lock().await;
        if *state != RegistrationState::Disconnected {
            return Err(BridgeError::invalid_state(format!(
                "Cannot connect while {}",
                *state
            )));
        }

        info!("Connecting to Lightwave");
        if let Err(e) = self.client.connect().await {
            let error = match e {
                BridgeError::Connection(_) => e,
                other => BridgeError::connection(other.to_string()),
            };
            log_structured_error!(error, "registration", "connect");
            return Err(error);
        }

        let session = BridgeSession::new(self.client.clone(), self.host.aggregator_vendor_id());
        info!(version = ?session.version, "Connected to Lightwave");
        *self.session.write().await = Some(session.clone());
        *state = RegistrationState::ConnectedUnauthorized;
        Ok(session)
    }

    /// Ask the backend whether this client is already registered. If it is,
    /// sync right away; otherwise expose the registration trigger.
    pub async fn check_authorization(&self) -> Result<AuthorizationOutcome> {
        let registered = {
            let mut state = self.state.lock().await;
            if *state != RegistrationState::ConnectedUnauthorized {
                return Err(BridgeError::invalid_state(format!(
                    "Cannot check authorization while {}",
                    *state
                )));
            }

            let registered = self.client.is_registered().await.map_err(|e| match e {
                BridgeError::Authentication(_) => e,
                other => BridgeError::authentication(other.to_string()),
            })?;
            if registered {
                *state = RegistrationState::ConnectedAuthorized;
            }
            registered
        };

        if registered {
            info!("Lightwave already registered");
            let report = self.run_sync().await;
            // Left over from a session that shut down without unregistering
            self.retire_trigger().await;
            return Ok(AuthorizationOutcome::Authorized { report });
        }

        self.expose_trigger().await?;
        Ok(AuthorizationOutcome::TriggerExposed)
    }

    /// Run the vendor handshake in response to the trigger being turned on.
    ///
    /// Only an actuation that finds the machine unauthorized proceeds; every
    /// other one is ignored.
    pub async fn actuate_trigger(&self) -> Result<TriggerOutcome> {
        {
            let mut state = self.state.lock().await;
            if *state != RegistrationState::ConnectedUnauthorized {
                debug!(state = %*state, "Ignoring trigger actuation");
                return Ok(TriggerOutcome::Ignored(*state));
            }
            *state = RegistrationState::Authorizing;
        }

        info!("Registration trigger actuated, registering with Lightwave");
        let handshake = self.client.ensure_registration().await;

        // Shutdown may have run while the handshake was in flight; only a
        // machine still authorizing takes the result.
        {
            let mut state = self.state.lock().await;
            let current = *state;
            match handshake {
                Err(e) => {
                    if current == RegistrationState::Authorizing {
                        *state = RegistrationState::ConnectedUnauthorized;
                    }
                    let error = match e {
                        BridgeError::Authentication(_) => e,
                        other => BridgeError::authentication(other.to_string()),
                    };
                    log_structured_error!(error, "registration", "ensure_registration");
                    return Err(error);
                }
                Ok(()) if current != RegistrationState::Authorizing => {
                    warn!(state = %current, "Registration finished after the bridge moved on; discarding");
                    return Ok(TriggerOutcome::Ignored(current));
                }
                Ok(()) => *state = RegistrationState::ConnectedAuthorized,
            }
        }
        info!("Registered with Lightwave");

        let report = self.run_sync().await;
        self.retire_trigger().await;
        Ok(TriggerOutcome::Authorized { report })
    }

    /// Sync again. Only valid once authorized.
    pub async fn resync(&self) -> Result<SyncReport> {
        let state = self.state().await;
        if state != RegistrationState::ConnectedAuthorized {
            return Err(BridgeError::invalid_state(format!(
                "Cannot sync while {state}"
            )));
        }
        let session = self
            .session()
            .await
            .ok_or_else(|| BridgeError::invalid_state("No Lightwave session"))?;
        self.sync.sync(&session).await
    }

    /// Drop the session and return to `Disconnected`. With `unregister`,
    /// every exposed device and the trigger are removed from the host first.
    /// Returns how many host devices were released.
    pub async fn shutdown(&self, unregister: bool) -> usize {
        let mut state = self.state.lock().await;

        let mut released = 0;
        if unregister {
            released += self.sync.unregister_all().await;
            if self.remove_trigger().await {
                released += 1;
            }
        }

        *self.session.write().await = None;
        *state = RegistrationState::Disconnected;
        info!(released, "Lightwave bridge shut down");
        released
    }

    async fn run_sync(&self) -> Option<SyncReport> {
        let session = self.session().await?;
        match self.sync.sync(&session).await {
            Ok(report) => {
                info!(
                    discovered = report.discovered,
                    registered = report.registered.len(),
                    failed = report.failed.len(),
                    "Device sync complete"
                );
                Some(report)
            }
            Err(e) => {
                log_structured_error!(e, "registration", "sync");
                None
            }
        }
    }

    async fn expose_trigger(&self) -> Result<()> {
        let mut trigger = self.trigger.lock().await;
        if let Some(id) = trigger.as_ref() {
            debug!(device = %id, "Registration trigger already exposed");
            return Ok(());
        }

        let definition = self.trigger_definition();
        let id = definition.id.clone();
        self.host.register_device(definition).await?;
        info!(device = %id, "Not registered with Lightwave; turn on the register button to continue");
        *trigger = Some(id);
        Ok(())
    }

    fn trigger_definition(&self) -> DeviceDefinition {
        let me = self.me.clone();
        let on = command_handler(move |_| {
            let me = me.clone();
            async move {
                let machine = me
                    .upgrade()
                    .ok_or_else(|| BridgeError::invalid_state("Bridge has been dropped"))?;
                machine.actuate_trigger().await.map(|_| ())
            }
        });
        let off = command_handler(|_| async {
            debug!("Registration trigger turned off");
            Ok(())
        });

        DeviceDefinition {
            id: CanonicalDeviceId::new(TRIGGER_ID),
            identity: DeviceIdentity {
                name: TRIGGER_NAME.to_string(),
                serial_number: TRIGGER_SERIAL_NUMBER.to_string(),
                vendor_id: self.host.aggregator_vendor_id(),
                vendor_name: TRIGGER_VENDOR_NAME.to_string(),
                product_name: TRIGGER_PRODUCT_NAME.to_string(),
                product_id: BRIDGED_PRODUCT_ID,
                software_version: FALLBACK_SOFTWARE_VERSION.to_string(),
                power_source: PowerSource::Wired,
            },
            profile: CapabilityProfile::OnOffOutlet,
            handlers: HashMap::from([(Command::On, on), (Command::Off, off)]),
        }
    }

    /// Reset the trigger to off and remove it, inline or on the runtime
    async fn retire_trigger(&self) {
        let Some(id) = self.trigger_id().await else {
            return;
        };

        if let Err(e) = self.host.set_on_off(&id, false).await {
            warn!(device = %id, error = %e, "Failed to reset registration trigger");
        }

        match self.removal {
            TriggerRemoval::Inline => {
                self.remove_trigger().await;
            }
            TriggerRemoval::Deferred => {
                let me = self.me.clone();
                tokio::spawn(async move {
                    if let Some(machine) = me.upgrade() {
                        machine.remove_trigger().await;
                    }
                });
            }
        }
    }

    /// Unregister the trigger. The id is taken, so this succeeds once.
    async fn remove_trigger(&self) -> bool {
        let Some(id) = self.trigger.lock().await.take() else {
            return false;
        };

        match self.host.unregister_device(&id).await {
            Ok(()) => {
                info!(device = %id, "Registration trigger removed");
                true
            }
            Err(e) => {
                warn!(device = %id, error = %e, "Failed to remove registration trigger");
                false
            }
        }
    }
}

impl fmt::Debug for RegistrationMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationMachine")
            .field("removal", &self.removal)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::memory::{InMemoryLightwave, Operation};
    use crate::client::RemoteDevice;
    use crate::host::memory::InMemoryHost;
    use crate::host::CommandRequest;
    use pretty_assertions::assert_eq;

    fn setup(
        client: InMemoryLightwave,
        removal: TriggerRemoval,
    ) -> (Arc<InMemoryLightwave>, Arc<InMemoryHost>, Arc<RegistrationMachine>) {
        let client = Arc::new(client.with_devices(vec![RemoteDevice::new(
            1, "Lounge", 10, "Ceiling", "D",
        )]));
        let host = Arc::new(InMemoryHost::new("3.3.0"));
        let machine = RegistrationMachine::new(client.clone(), host.clone(), removal);
        (client, host, machine)
    }

    fn trigger() -> CanonicalDeviceId {
        CanonicalDeviceId::new(TRIGGER_ID)
    }

    #[tokio::test]
    async fn test_connect_moves_to_unauthorized() {
        let (_client, _host, machine) = setup(InMemoryLightwave::new(), TriggerRemoval::Inline);
        assert_eq!(machine.state().await, RegistrationState::Disconnected);

        machine.connect().await.unwrap();

        assert_eq!(machine.state().await, RegistrationState::ConnectedUnauthorized);
        assert!(machine.session().await.is_some());
    }

    #[tokio::test]
    async fn test_connect_twice_is_invalid_state() {
        let (_client, _host, machine) = setup(InMemoryLightwave::new(), TriggerRemoval::Inline);
        machine.connect().await.unwrap();

        let err = machine.connect().await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_connect_failure_stays_disconnected() {
        let client = InMemoryLightwave::new();
        client.fail(Operation::Connect, "host unreachable").await;
        let (_client, _host, machine) = setup(client, TriggerRemoval::Inline);

        let err = machine.connect().await.unwrap_err();

        assert!(matches!(err, BridgeError::Connection(_)));
        assert_eq!(machine.state().await, RegistrationState::Disconnected);
        assert!(machine.session().await.is_none());
    }

    #[tokio::test]
    async fn test_registered_client_syncs_without_trigger() {
        let (_client, host, machine) = setup(
            InMemoryLightwave::new().with_registered(true),
            TriggerRemoval::Inline,
        );
        machine.connect().await.unwrap();

        let outcome = machine.check_authorization().await.unwrap();

        assert!(matches!(
            outcome,
            AuthorizationOutcome::Authorized { report: Some(_) }
        ));
        assert_eq!(machine.state().await, RegistrationState::ConnectedAuthorized);
        assert!(!host.contains(&trigger()).await);
        assert!(host.contains(&CanonicalDeviceId::new("1-10")).await);
    }

    #[tokio::test]
    async fn test_unregistered_client_exposes_trigger() {
        let (_client, host, machine) = setup(InMemoryLightwave::new(), TriggerRemoval::Inline);
        machine.connect().await.unwrap();

        let outcome = machine.check_authorization().await.unwrap();

        assert_eq!(outcome, AuthorizationOutcome::TriggerExposed);
        assert_eq!(host.registered_devices().await, vec![trigger()]);

        let snapshot = host.device(&trigger()).await.unwrap();
        assert_eq!(snapshot.profile, CapabilityProfile::OnOffOutlet);
        assert_eq!(snapshot.identity.name, TRIGGER_NAME);
        assert_eq!(snapshot.identity.serial_number, TRIGGER_SERIAL_NUMBER);
        assert_eq!(snapshot.identity.vendor_name, TRIGGER_VENDOR_NAME);
        assert_eq!(snapshot.identity.product_name, TRIGGER_PRODUCT_NAME);
    }

    #[tokio::test]
    async fn test_trigger_actuation_authorizes_and_removes_inline() {
        let (client, host, machine) = setup(InMemoryLightwave::new(), TriggerRemoval::Inline);
        machine.connect().await.unwrap();
        machine.check_authorization().await.unwrap();

        host.invoke(&trigger(), CommandRequest::on()).await.unwrap();

        assert!(client.registered().await);
        assert_eq!(machine.state().await, RegistrationState::ConnectedAuthorized);
        assert!(machine.trigger_id().await.is_none());
        assert_eq!(
            host.registered_devices().await,
            vec![CanonicalDeviceId::new("1-10")]
        );
    }

    #[tokio::test]
    async fn test_trigger_off_is_acknowledged() {
        let (client, host, machine) = setup(InMemoryLightwave::new(), TriggerRemoval::Inline);
        machine.connect().await.unwrap();
        machine.check_authorization().await.unwrap();

        host.invoke(&trigger(), CommandRequest::off()).await.unwrap();

        assert_eq!(machine.state().await, RegistrationState::ConnectedUnauthorized);
        assert_eq!(client.call_count(Operation::EnsureRegistration).await, 0);
    }

    #[tokio::test]
    async fn test_registration_failure_keeps_trigger() {
        let (client, host, machine) = setup(InMemoryLightwave::new(), TriggerRemoval::Inline);
        machine.connect().await.unwrap();
        machine.check_authorization().await.unwrap();
        client.fail(Operation::EnsureRegistration, "pairing refused").await;

        let err = host
            .invoke(&trigger(), CommandRequest::on())
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::Authentication(_)));
        assert_eq!(machine.state().await, RegistrationState::ConnectedUnauthorized);
        assert!(host.contains(&trigger()).await);
        assert!(!host.device(&trigger()).await.unwrap().on_off);

        client.clear_failure(Operation::EnsureRegistration).await;
        host.invoke(&trigger(), CommandRequest::on()).await.unwrap();
        assert_eq!(machine.state().await, RegistrationState::ConnectedAuthorized);
    }

    #[tokio::test]
    async fn test_actuation_outside_unauthorized_is_ignored() {
        let (_client, _host, machine) = setup(InMemoryLightwave::new(), TriggerRemoval::Inline);

        let outcome = machine.actuate_trigger().await.unwrap();

        assert_eq!(
            outcome,
            TriggerOutcome::Ignored(RegistrationState::Disconnected)
        );
    }

    #[tokio::test]
    async fn test_handshake_finishing_after_shutdown_is_discarded() {
        let (client, host, machine) = setup(InMemoryLightwave::new(), TriggerRemoval::Inline);
        machine.connect().await.unwrap();
        machine.check_authorization().await.unwrap();
        let gate = client.hold_registration().await;

        let pending = tokio::spawn({
            let machine = machine.clone();
            async move { machine.actuate_trigger().await }
        });
        while machine.state().await != RegistrationState::Authorizing {
            tokio::task::yield_now().await;
        }
        machine.shutdown(false).await;
        gate.notify_one();

        let outcome = pending.await.unwrap().unwrap();

        assert_eq!(
            outcome,
            TriggerOutcome::Ignored(RegistrationState::Disconnected)
        );
        assert_eq!(machine.state().await, RegistrationState::Disconnected);
        assert!(machine.session().await.is_none());
        assert_eq!(machine.trigger_id().await, Some(trigger()));
        assert_eq!(host.registered_devices().await, vec![trigger()]);
    }

    #[tokio::test]
    async fn test_resync_requires_authorization() {
        let (_client, _host, machine) = setup(InMemoryLightwave::new(), TriggerRemoval::Inline);
        machine.connect().await.unwrap();

        assert!(matches!(
            machine.resync().await,
            Err(BridgeError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_releases_devices_and_trigger() {
        let (_client, host, machine) = setup(InMemoryLightwave::new(), TriggerRemoval::Inline);
        machine.connect().await.unwrap();
        machine.check_authorization().await.unwrap();

        let released = machine.shutdown(true).await;

        assert_eq!(released, 1);
        assert!(host.is_empty().await);
        assert_eq!(machine.state().await, RegistrationState::Disconnected);
        assert!(machine.session().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_machine_rejects_trigger() {
        let (_client, host, machine) = setup(InMemoryLightwave::new(), TriggerRemoval::Inline);
        machine.connect().await.unwrap();
        machine.check_authorization().await.unwrap();
        drop(machine);

        let err = host
            .invoke(&trigger(), CommandRequest::on())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidState(_)));
    }
}
