//! Server configuration loaded from environment variables via `envy`.
//!
//! Each field maps to `RECLAIM_GATEWAY_<FIELD>`:
//!   - `RECLAIM_GATEWAY_LISTEN_ADDR`       (default `0.0.0.0:8080`)
//!   - `RECLAIM_GATEWAY_API_KEY`           (required to accept requests)
//!   - `RECLAIM_GATEWAY_WORKFLOW_TOKEN`    (required to dispatch)
//!   - `RECLAIM_GATEWAY_CALLBACK_TOKEN`    (enables `PUT /terraform/runs/{id}`)
//!   - `RECLAIM_GATEWAY_GITHUB_OWNER` / `_GITHUB_REPO` / `_EVENT_TYPE`
//!   - `RECLAIM_GATEWAY_DEFAULT_REGION`    (default `us-east-2`)
//!   - `RECLAIM_GATEWAY_VALKEY_URL`        (optional; in-memory store when unset)

use std::time::Duration;

use anyhow::{Context, Result};
use reclaim_common::{DEFAULT_REGION, DEFAULT_STATE_NAMESPACE};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "RECLAIM_GATEWAY_";

#[derive(Clone, Deserialize)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Key clients must present in `x-api-key`.
    pub api_key: Option<String>,

    /// Token for the workflow engine's dispatch API.
    pub workflow_token: Option<String>,

    /// Bearer token the workflow engine presents when reporting progress.
    pub callback_token: Option<String>,

    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    #[serde(default = "default_github_owner")]
    pub github_owner: String,

    #[serde(default = "default_github_repo")]
    pub github_repo: String,

    /// `event_type` of the `repository_dispatch` sent upstream.
    #[serde(default = "default_event_type")]
    pub event_type: String,

    #[serde(default = "default_region")]
    pub default_region: String,

    #[serde(default = "default_state_namespace")]
    pub state_namespace: String,

    #[serde(default = "default_cors_allow_origin")]
    pub cors_allow_origin: String,

    /// Valkey (Redis-compatible) connection URL.
    pub valkey_url: Option<String>,

    /// ACL username for Valkey authentication.
    pub valkey_user: Option<String>,

    /// Path to file containing the ACL password (Docker secret).
    pub valkey_pass_file: Option<String>,

    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_github_owner() -> String {
    "dregraham".to_string()
}

fn default_github_repo() -> String {
    "resume".to_string()
}

fn default_event_type() -> String {
    "terraform-provision".to_string()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_state_namespace() -> String {
    DEFAULT_STATE_NAMESPACE.to_string()
}

fn default_cors_allow_origin() -> String {
    "*".to_string()
}

fn default_upstream_timeout_secs() -> u64 {
    10
}

impl GatewayConfig {
    /// Load from `RECLAIM_GATEWAY_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds a value of the wrong type.
    pub fn from_env() -> Result<Self> {
        envy::prefixed(ENV_PREFIX)
            .from_env()
            .context("failed to load config from RECLAIM_GATEWAY_* env vars")
    }

    /// Load from explicit key/value pairs, as `from_env` would read them.
    ///
    /// # Errors
    ///
    /// Returns an error if a value has the wrong type.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter(pairs)
            .context("invalid gateway configuration")
    }

    #[must_use]
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs.max(1))
    }

    /// `RECLAIM_GATEWAY_API_KEY`, when set to something non-empty.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        non_empty(self.api_key.as_deref())
    }

    #[must_use]
    pub fn workflow_token(&self) -> Option<&str> {
        non_empty(self.workflow_token.as_deref())
    }

    #[must_use]
    pub fn callback_token(&self) -> Option<&str> {
        non_empty(self.callback_token.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// Secrets stay out of debug output and logs.
impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("listen_addr", &self.listen_addr)
            .field("api_key", &self.api_key().map(|_| "<set>"))
            .field("workflow_token", &self.workflow_token().map(|_| "<set>"))
            .field("callback_token", &self.callback_token().map(|_| "<set>"))
            .field("github_api_url", &self.github_api_url)
            .field("github_owner", &self.github_owner)
            .field("github_repo", &self.github_repo)
            .field("event_type", &self.event_type)
            .field("default_region", &self.default_region)
            .field("state_namespace", &self.state_namespace)
            .field("cors_allow_origin", &self.cors_allow_origin)
            .field("valkey_url", &self.valkey_url)
            .field("valkey_user", &self.valkey_user)
            .field("upstream_timeout_secs", &self.upstream_timeout_secs)
            .finish_non_exhaustive()
    }
}
