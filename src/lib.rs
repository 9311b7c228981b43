//! Bridge exposing LightwaveRF lights as Matter-style bridged devices
//!
//! The crate sits between a Lightwave vendor client and a host device model
//! (a Matter bridge aggregator):
//!
//! - Discovers the vendor's rooms and devices and exposes each one as an
//!   on/off or dimmable light
//! - Translates host commands into vendor calls
//! - Walks the user through vendor registration with a temporary on/off
//!   "register button" device
//!
//! Both sides are traits ([`client::LightwaveClient`], [`host::DeviceHost`]);
//! in-memory implementations of each are included.

pub mod bridge;
pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;

// Re-export main types for convenience
pub use bridge::{LightwavePlatform, RegistrationMachine, RegistrationState};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
