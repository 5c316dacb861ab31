//! Typed domain error enums.
//!
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use reclaim_common::Mode;
use thiserror::Error;

use crate::domain::session::Phase;

// ── Controller errors ─────────────────────────────────────────────────────────

/// Errors raised by the lifecycle controller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("Gateway is not configured: {0}")]
    Configuration(String),

    #[error("{action} dispatch failed: {message}")]
    Dispatch { action: Mode, message: String },

    #[error("Status polling failed {attempts} times in a row: {message}")]
    TransientPoll { attempts: u32, message: String },

    #[error("{action} run {run_id} ended with status '{status}'")]
    RemoteFailure {
        action: Mode,
        run_id: String,
        status: String,
    },

    #[error("Gateway refused the status query for {action} run {run_id} ({status}): {message}")]
    StatusRejected {
        action: Mode,
        run_id: String,
        status: u16,
        message: String,
    },

    #[error("No environment to destroy. Run 'reclaim up' to provision one.")]
    NoActiveResource,

    #[error("Controller is busy ({phase}); wait for the current run to finish.")]
    Busy { phase: Phase },

    #[error("Environment {run_id} has not been reclaimed. Destroy it before provisioning again.")]
    UnreclaimedResource { run_id: String },

    #[error("Lifecycle controller has stopped.")]
    Stopped,
}

impl ControllerError {
    /// Stable machine-readable code for `--json` output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Dispatch { .. } => "dispatch_failed",
            Self::TransientPoll { .. } => "poll_unreachable",
            Self::RemoteFailure { .. } => "remote_failure",
            Self::StatusRejected { .. } => "status_rejected",
            Self::NoActiveResource => "no_active_resource",
            Self::Busy { .. } => "busy",
            Self::UnreclaimedResource { .. } => "unreclaimed_resource",
            Self::Stopped => "stopped",
        }
    }
}

// ── Gateway errors ────────────────────────────────────────────────────────────

/// Failures talking to the dispatch gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("gateway unreachable: {0}")]
    Transport(String),

    #[error("gateway request timed out")]
    Timeout,

    #[error("gateway returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected gateway response: {0}")]
    Decode(String),
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration key/value validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\nValid values: {valid}")]
    InvalidValue {
        key: String,
        value: String,
        valid: String,
    },
}
