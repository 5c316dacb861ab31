//! Upstream workflow engine: GitHub `repository_dispatch`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reclaim_common::Mode;
use serde::Serialize;
use thiserror::Error;

use crate::config::GatewayConfig;

/// `client_payload` of the repository dispatch, as the workflow reads it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClientPayload {
    pub request_id: String,
    pub aws_region: String,
    pub mode: Mode,
    pub state_key: String,
}

#[derive(Debug, Error)]
pub enum DispatchFailure {
    #[error("workflow token is not configured")]
    NotConfigured,

    #[error("Unable to reach GitHub API")]
    Unreachable(String),

    #[error("Failed to dispatch workflow")]
    Rejected { status: u16, body: String },
}

impl DispatchFailure {
    /// Text for the `details` field of the 502 body.
    #[must_use]
    pub fn details(&self) -> String {
        match self {
            Self::NotConfigured => String::new(),
            Self::Unreachable(reason) => reason.clone(),
            Self::Rejected { status, body } => format!("upstream status {status}: {body}"),
        }
    }
}

#[async_trait]
pub trait WorkflowDispatcher: Send + Sync {
    /// Whether dispatches can be attempted at all.
    fn is_configured(&self) -> bool;

    async fn dispatch(&self, payload: &ClientPayload) -> Result<(), DispatchFailure>;
}

#[derive(Serialize)]
struct DispatchBody<'a> {
    event_type: &'a str,
    client_payload: &'a ClientPayload,
}

pub struct GithubDispatcher {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    event_type: String,
}

impl GithubDispatcher {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.upstream_timeout())
            .user_agent(concat!("reclaim-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build upstream HTTP client")?;
        Ok(Self {
            client,
            url: dispatches_url(&config.github_api_url, &config.github_owner, &config.github_repo),
            token: config.workflow_token().map(str::to_string),
            event_type: config.event_type.clone(),
        })
    }
}

fn dispatches_url(api: &str, owner: &str, repo: &str) -> String {
    format!("{}/repos/{owner}/{repo}/dispatches", api.trim_end_matches('/'))
}

#[async_trait]
impl WorkflowDispatcher for GithubDispatcher {
    fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    async fn dispatch(&self, payload: &ClientPayload) -> Result<(), DispatchFailure> {
        let token = self.token.as_deref().ok_or(DispatchFailure::NotConfigured)?;
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .bearer_auth(token)
            .json(&DispatchBody {
                event_type: &self.event_type,
                client_payload: payload,
            })
            .send()
            .await
            .map_err(|e| DispatchFailure::Unreachable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(DispatchFailure::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
