//! Runs and the resources they leave behind.

use chrono::{DateTime, Utc};
use reclaim_common::{DispatchAccepted, DispatchRequest, Mode, RunStatus, state_key};
use serde::Serialize;

/// A provisioned environment, identified by the run that created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub run_id: String,
    pub state_key: String,
    pub region: String,
}

/// One provision or destroy attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Run {
    pub run_id: String,
    pub state_key: String,
    pub action: Mode,
    pub region: String,
    pub status: RunStatus,
    pub logs: String,
    pub created_at: DateTime<Utc>,
}

impl Run {
    /// A provision run with a state key derived from `namespace`.
    #[must_use]
    pub fn provision(run_id: String, namespace: &str, region: &str, at: DateTime<Utc>) -> Self {
        Self {
            state_key: state_key(namespace, &run_id),
            run_id,
            action: Mode::Provision,
            region: region.to_string(),
            status: RunStatus::Queued,
            logs: String::new(),
            created_at: at,
        }
    }

    /// A destroy run targeting `resource`'s state.
    #[must_use]
    pub fn destroy(run_id: String, resource: &Resource, at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            state_key: resource.state_key.clone(),
            action: Mode::Destroy,
            region: resource.region.clone(),
            status: RunStatus::Queued,
            logs: String::new(),
            created_at: at,
        }
    }

    #[must_use]
    pub fn dispatch_request(&self) -> DispatchRequest {
        DispatchRequest::new(
            self.action,
            self.run_id.clone(),
            self.state_key.clone(),
            self.region.clone(),
        )
    }

    #[must_use]
    pub fn resource(&self) -> Resource {
        Resource {
            run_id: self.run_id.clone(),
            state_key: self.state_key.clone(),
            region: self.region.clone(),
        }
    }

    /// Adopt identifiers the gateway assigned.
    pub fn assign(&mut self, accepted: &DispatchAccepted) {
        accepted.tracking_id().clone_into(&mut self.run_id);
        if !accepted.state_key.is_empty() {
            accepted.state_key.clone_into(&mut self.state_key);
        }
    }

    /// Record the latest log text. Logs only grow: a shorter report than what
    /// is already held is ignored. Returns `true` if new text arrived.
    pub fn observe_logs(&mut self, logs: &str) -> bool {
        if logs.len() <= self.logs.len() {
            return false;
        }
        logs.clone_into(&mut self.logs);
        true
    }
}

/// Fresh client-side run id.
#[must_use]
pub fn generate_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Deterministic id of the `attempt`-th destroy of a resource.
#[must_use]
pub fn destroy_run_id(resource_run_id: &str, attempt: u32) -> String {
    format!("{resource_run_id}-destroy-{attempt}")
}
