//! Maps vendor device type codes onto capability profiles

use crate::client::{RemoteDevice, DIMMER_TYPE_CODE};
use crate::host::CapabilityProfile;
use serde::{Deserialize, Serialize};

/// Kind of light a remote device is bridged as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    Switch,
    Dimmer,
}

impl DeviceKind {
    /// Host profile for this kind
    pub fn profile(&self) -> CapabilityProfile {
        match self {
            DeviceKind::Switch => CapabilityProfile::OnOffLight,
            DeviceKind::Dimmer => CapabilityProfile::DimmableLight,
        }
    }

    /// Product name published in the device's basic information
    pub fn product_name(&self) -> &'static str {
        match self {
            DeviceKind::Switch => "Light switch",
            DeviceKind::Dimmer => "Dimmer",
        }
    }
}

/// Classify a remote device. Unknown type codes fall back to `Switch`.
pub fn classify(device: &RemoteDevice) -> DeviceKind {
    if device.device_type == DIMMER_TYPE_CODE {
        DeviceKind::Dimmer
    } else {
        DeviceKind::Switch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("D", DeviceKind::Dimmer)]
    #[case("O", DeviceKind::Switch)]
    #[case("", DeviceKind::Switch)]
    #[case("d", DeviceKind::Switch)]
    #[case("Dimmer", DeviceKind::Switch)]
    fn test_classify_by_type_code(#[case] code: &str, #[case] expected: DeviceKind) {
        let device = RemoteDevice::new(1, "Lounge", 1, "Lamp", code);
        assert_eq!(classify(&device), expected);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let device = RemoteDevice::new(1, "Lounge", 1, "Lamp", "D");
        let first = classify(&device);
        for _ in 0..10 {
            assert_eq!(classify(&device), first);
        }
    }

    #[test]
    fn test_profiles() {
        assert_eq!(DeviceKind::Dimmer.profile(), CapabilityProfile::DimmableLight);
        assert_eq!(DeviceKind::Switch.profile(), CapabilityProfile::OnOffLight);
    }
}
