//! Lightwave to host device bridge
//!
//! - [`units`]: native level and percentage conversion
//! - [`classifier`]: vendor type code to device kind
//! - [`translator`]: host commands to vendor calls
//! - [`sync`]: discovery and reconciliation
//! - [`registration`]: vendor authorization and the registration trigger
//! - [`platform`]: host lifecycle hooks

pub mod classifier;
pub mod platform;
pub mod registration;
pub mod session;
pub mod sync;
pub mod translator;
pub mod units;

pub use classifier::{classify, DeviceKind};
pub use platform::LightwavePlatform;
pub use registration::{
    AuthorizationOutcome, RegistrationMachine, RegistrationState, TriggerOutcome, TRIGGER_ID,
};
pub use session::BridgeSession;
pub use sync::{DeviceSync, SyncReport};
pub use translator::CommandTranslator;
