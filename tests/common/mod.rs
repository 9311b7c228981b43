//! Shared fixtures for bridge scenarios
//!
//! Provides the two-device Lightwave installation used across scenarios and
//! a helper that wires a platform to in-memory client and host.

#![allow(dead_code)]

use lightwave_bridge::client::memory::InMemoryLightwave;
use lightwave_bridge::client::RemoteDevice;
use lightwave_bridge::config::{PlatformConfig, TriggerRemoval};
use lightwave_bridge::host::memory::InMemoryHost;
use lightwave_bridge::host::CanonicalDeviceId;
use lightwave_bridge::LightwavePlatform;
use rstest::fixture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const HOST_VERSION: &str = "3.3.0";

/// Room 1 with a dimmer (device 10) and a switch (device 11)
#[fixture]
pub fn lounge() -> Vec<RemoteDevice> {
    vec![
        RemoteDevice::new(1, "Lounge", 10, "Ceiling", "D"),
        RemoteDevice::new(1, "Lounge", 11, "Lamp", "O"),
    ]
}

pub fn dimmer_id() -> CanonicalDeviceId {
    CanonicalDeviceId::new("1-10")
}

pub fn switch_id() -> CanonicalDeviceId {
    CanonicalDeviceId::new("1-11")
}

/// A platform wired to in-memory client and host
pub struct TestBridge {
    pub client: Arc<InMemoryLightwave>,
    pub host: Arc<InMemoryHost>,
    pub platform: LightwavePlatform,
}

impl TestBridge {
    pub fn new(client: InMemoryLightwave, config: PlatformConfig) -> Self {
        Self::with_host_version(client, config, HOST_VERSION)
    }

    pub fn with_host_version(
        client: InMemoryLightwave,
        config: PlatformConfig,
        host_version: &str,
    ) -> Self {
        let client = Arc::new(client);
        let host = Arc::new(InMemoryHost::new(host_version));
        let platform = LightwavePlatform::new(config, client.clone(), host.clone());
        Self {
            client,
            host,
            platform,
        }
    }

    /// Not yet registered with Lightwave, seeded with `devices`
    pub fn unregistered(devices: Vec<RemoteDevice>, removal: TriggerRemoval) -> Self {
        Self::new(
            InMemoryLightwave::new().with_devices(devices),
            PlatformConfig {
                trigger_removal: removal,
                ..PlatformConfig::default()
            },
        )
    }

    /// Already registered with Lightwave, seeded with `devices`
    pub fn registered(devices: Vec<RemoteDevice>) -> Self {
        Self::new(
            InMemoryLightwave::new()
                .with_devices(devices)
                .with_registered(true),
            PlatformConfig::default(),
        )
    }
}

/// Poll `condition` until it holds or a second has passed
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
