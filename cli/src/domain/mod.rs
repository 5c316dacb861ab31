//! Domain layer: pure lifecycle types, the session state machine, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod run;
pub mod session;

pub use config::{ReclaimConfig, validate_config_key, validate_config_value};
pub use error::{ConfigError, ControllerError, GatewayError};
pub use run::{Resource, Run};
pub use session::{
    DestroyReason, Effect, Event, Observation, Phase, Session, SessionSettings, Snapshot,
};
