//! reclaim dispatch gateway.
//!
//! Accepts provision/destroy requests from `reclaim`, records each run once,
//! and forwards it to the workflow engine as a repository dispatch.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod routes;
pub mod store;
pub mod valkey;

pub use config::GatewayConfig;
pub use routes::{AppState, router};
