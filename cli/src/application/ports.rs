//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`; never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use reclaim_common::{DispatchAccepted, DispatchRequest, RunStatusResponse};

use crate::domain::config::ReclaimConfig;
use crate::domain::error::GatewayError;

// ── Gateway Port ──────────────────────────────────────────────────────────────

/// Client side of the dispatch gateway.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DispatchGateway: Send + Sync {
    /// Submit a provision or destroy dispatch. Any non-2xx is an error.
    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchAccepted, GatewayError>;
    /// Read a run's status. `Ok(None)` means the run is not recorded yet.
    async fn status(&self, run_id: &str) -> Result<Option<RunStatusResponse>, GatewayError>;
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts configuration persistence.
pub trait ConfigStore {
    /// Load the configuration, returning defaults if none is stored.
    fn load(&self) -> Result<ReclaimConfig>;
    /// Persist the configuration.
    fn save(&self, config: &ReclaimConfig) -> Result<()>;
    /// Location of the stored configuration.
    fn path(&self) -> Result<PathBuf>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting for long-running lifecycle operations.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
    /// Emit one line of workflow output.
    fn log_line(&self, line: &str);
    /// Seconds left before the environment is reclaimed.
    fn countdown(&self, seconds: u64);
}
