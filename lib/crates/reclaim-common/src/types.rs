use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side-effecting operation a run performs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Provision,
    Destroy,
}

impl Mode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Provision => "provision",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    /// Accepts `provision` (alias `apply`) and `destroy`, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "provision" | "apply" => Ok(Self::Provision),
            "destroy" => Ok(Self::Destroy),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

/// Body of `POST /terraform`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchRequest {
    pub event_type: Mode,
    pub mode: Mode,
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(rename = "stateKey")]
    pub state_key: String,
    pub region: String,
}

impl DispatchRequest {
    #[must_use]
    pub fn new(
        mode: Mode,
        request_id: impl Into<String>,
        state_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            event_type: mode,
            mode,
            request_id: request_id.into(),
            state_key: state_key.into(),
            region: region.into(),
        }
    }
}

/// `202 Accepted` body of a dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchAccepted {
    pub request_id: String,
    /// Set when the backend assigns its own run id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub state_key: String,
    pub mode: Mode,
    pub region: String,
}

impl DispatchAccepted {
    /// The id to poll: the backend's run id if it supplied one.
    #[must_use]
    pub fn tracking_id(&self) -> &str {
        self.run_id.as_deref().unwrap_or(&self.request_id)
    }
}

/// `200 OK` body of a status query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunStatusResponse {
    #[serde(default)]
    pub run_id: String,
    pub status: String,
    #[serde(default)]
    pub logs: String,
}

/// Run store row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub status: String,
    #[serde(default)]
    pub logs: String,
    #[serde(default)]
    pub clouds: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// A freshly dispatched run.
    #[must_use]
    pub fn queued(request: &DispatchRequest, clouds: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            run_id: request.request_id.clone(),
            status: "queued".to_string(),
            logs: String::new(),
            clouds,
            created_at: now,
            mode: Some(request.mode),
            state_key: Some(request.state_key.clone()),
            region: Some(request.region.clone()),
            updated_at: None,
        }
    }

    /// Apply an engine update. Logs are appended, never replaced.
    pub fn apply(&mut self, update: &RunUpdate, now: DateTime<Utc>) {
        self.status = update.status.trim().to_ascii_lowercase();
        if let Some(logs) = update.logs.as_deref().filter(|l| !l.is_empty()) {
            if !self.logs.is_empty() && !self.logs.ends_with('\n') {
                self.logs.push('\n');
            }
            self.logs.push_str(logs);
        }
        self.updated_at = Some(now);
    }

    #[must_use]
    pub fn to_status_response(&self) -> RunStatusResponse {
        RunStatusResponse {
            run_id: self.run_id.clone(),
            status: self.status.clone(),
            logs: self.logs.clone(),
        }
    }
}

/// Workflow-engine callback body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunUpdate {
    pub status: String,
    /// Appended to the stored logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}

/// JSON error body shared by every gateway error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
