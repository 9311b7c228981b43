//! In-memory Lightwave backend
//!
//! Stands in for the vendor transport when running offline and in tests.
//! Every call is recorded, failures can be injected per operation, and the
//! registration handshake can be held open to exercise in-flight behavior.

use super::{LightwaveClient, RemoteDevice};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, info};

/// Vendor operations, used to target failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    IsRegistered,
    EnsureRegistration,
    GetDevices,
    TurnOn,
    TurnOff,
    Dim,
}

/// A recorded vendor call
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCall {
    Connect,
    IsRegistered,
    EnsureRegistration,
    GetDevices,
    TurnOn(RemoteDevice),
    TurnOff(RemoteDevice),
    Dim(RemoteDevice, f64),
}

impl ClientCall {
    fn operation(&self) -> Operation {
        match self {
            ClientCall::Connect => Operation::Connect,
            ClientCall::IsRegistered => Operation::IsRegistered,
            ClientCall::EnsureRegistration => Operation::EnsureRegistration,
            ClientCall::GetDevices => Operation::GetDevices,
            ClientCall::TurnOn(_) => Operation::TurnOn,
            ClientCall::TurnOff(_) => Operation::TurnOff,
            ClientCall::Dim(..) => Operation::Dim,
        }
    }
}

/// In-memory vendor backend
pub struct InMemoryLightwave {
    devices: RwLock<Vec<RemoteDevice>>,
    registered: RwLock<bool>,
    version: Option<String>,
    failures: RwLock<HashMap<Operation, String>>,
    calls: RwLock<Vec<ClientCall>>,
    registration_gate: RwLock<Option<Arc<Notify>>>,
}

impl InMemoryLightwave {
    /// Create an empty, unregistered backend
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(Vec::new()),
            registered: RwLock::new(false),
            version: None,
            failures: RwLock::new(HashMap::new()),
            calls: RwLock::new(Vec::new()),
            registration_gate: RwLock::new(None),
        }
    }

    /// Seed the device list
    pub fn with_devices(self, devices: Vec<RemoteDevice>) -> Self {
        Self {
            devices: RwLock::new(devices),
            ..self
        }
    }

    /// Start out already authorized
    pub fn with_registered(self, registered: bool) -> Self {
        Self {
            registered: RwLock::new(registered),
            ..self
        }
    }

    /// Report a protocol version
    pub fn with_version(self, version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..self
        }
    }

    /// Replace the device list returned by subsequent queries
    pub async fn set_devices(&self, devices: Vec<RemoteDevice>) {
        *self.devices.write().await = devices;
    }

    /// Make every call to `operation` fail with `message` until cleared
    pub async fn fail(&self, operation: Operation, message: impl Into<String>) {
        self.failures.write().await.insert(operation, message.into());
    }

    /// Stop failing `operation`
    pub async fn clear_failure(&self, operation: Operation) {
        self.failures.write().await.remove(&operation);
    }

    /// Hold `ensure_registration` until the returned handle is notified
    pub async fn hold_registration(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.registration_gate.write().await = Some(gate.clone());
        gate
    }

    /// All calls made so far, in order
    pub async fn calls(&self) -> Vec<ClientCall> {
        self.calls.read().await.clone()
    }

    /// Number of calls made to `operation`
    pub async fn call_count(&self, operation: Operation) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    /// Whether the backend currently considers this client authorized
    pub async fn registered(&self) -> bool {
        *self.registered.read().await
    }

    async fn record(&self, call: ClientCall) -> Result<()> {
        let operation = call.operation();
        debug!(?call, "Lightwave call");
        self.calls.write().await.push(call);

        match self.failures.read().await.get(&operation) {
            Some(message) => Err(failure_for(operation, message)),
            None => Ok(()),
        }
    }
}

fn failure_for(operation: Operation, message: &str) -> BridgeError {
    match operation {
        Operation::Connect => BridgeError::connection(message),
        Operation::IsRegistered | Operation::EnsureRegistration => {
            BridgeError::authentication(message)
        }
        Operation::GetDevices => BridgeError::discovery(message),
        Operation::TurnOn | Operation::TurnOff | Operation::Dim => {
            BridgeError::device_control(message)
        }
    }
}

impl Default for InMemoryLightwave {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LightwaveClient for InMemoryLightwave {
    async fn connect(&self) -> Result<()> {
        self.record(ClientCall::Connect).await
    }

    async fn is_registered(&self) -> Result<bool> {
        self.record(ClientCall::IsRegistered).await?;
        Ok(*self.registered.read().await)
    }

    async fn ensure_registration(&self) -> Result<()> {
        let gate = self.registration_gate.read().await.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.record(ClientCall::EnsureRegistration).await?;
        *self.registered.write().await = true;
        info!("Lightwave link accepted registration");
        Ok(())
    }

    async fn get_devices(&self) -> Result<Vec<RemoteDevice>> {
        self.record(ClientCall::GetDevices).await?;
        Ok(self.devices.read().await.clone())
    }

    async fn turn_on(&self, device: &RemoteDevice) -> Result<()> {
        self.record(ClientCall::TurnOn(device.clone())).await?;
        info!(room = device.room_id, device = device.device_id, "Lightwave on");
        Ok(())
    }

    async fn turn_off(&self, device: &RemoteDevice) -> Result<()> {
        self.record(ClientCall::TurnOff(device.clone())).await?;
        info!(room = device.room_id, device = device.device_id, "Lightwave off");
        Ok(())
    }

    async fn dim(&self, device: &RemoteDevice, percentage: f64) -> Result<()> {
        self.record(ClientCall::Dim(device.clone(), percentage))
            .await?;
        info!(
            room = device.room_id,
            device = device.device_id,
            percentage,
            "Lightwave dim"
        );
        Ok(())
    }

    fn version(&self) -> Option<String> {
        self.version.clone()
    }
}
