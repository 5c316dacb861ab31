//! `reqwest` implementation of the `DispatchGateway` port.

use std::time::Duration;

use async_trait::async_trait;
use reclaim_common::{DispatchAccepted, DispatchRequest, ErrorBody, RunStatusResponse};
use reqwest::{StatusCode, Url};

use crate::application::ports::DispatchGateway;
use crate::domain::config::GatewayConfig;
use crate::domain::error::{ControllerError, GatewayError};

const API_KEY_HEADER: &str = "x-api-key";
const MAX_CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_BACKOFF: Duration = Duration::from_millis(250);

/// HTTP client for `POST /terraform` and `GET /terraform?runId=`.
pub struct HttpGateway {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl HttpGateway {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// [`ControllerError::Configuration`] if the endpoint or API key is
    /// missing or the endpoint is not a URL.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ControllerError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                ControllerError::Configuration(
                    "gateway.endpoint is not set (reclaim config set gateway.endpoint <url>, or RECLAIM_ENDPOINT)"
                        .to_string(),
                )
            })?;
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ControllerError::Configuration(
                    "gateway.api_key is not set (reclaim config set gateway.api_key <key>, or RECLAIM_API_KEY)"
                        .to_string(),
                )
            })?;
        let endpoint = Url::parse(endpoint).map_err(|e| {
            ControllerError::Configuration(format!("gateway.endpoint is not a valid URL: {e}"))
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(concat!("reclaim/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ControllerError::Configuration(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl DispatchGateway for HttpGateway {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchAccepted, GatewayError> {
        let mut backoff = CONNECT_BACKOFF;
        let mut attempt = 1;
        // Only connection failures are retried: the request never reached the
        // gateway, and a repeat carries the same requestId.
        let response = loop {
            let sent = self
                .client
                .post(self.endpoint.clone())
                .header(API_KEY_HEADER, &self.api_key)
                .json(request)
                .send()
                .await;
            match sent {
                Ok(response) => break response,
                Err(err) if err.is_connect() && attempt < MAX_CONNECT_ATTEMPTS => {
                    tracing::debug!(attempt, error = %err, "gateway connection failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(transport_error(&err)),
            }
        };
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }
        response
            .json::<DispatchAccepted>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn status(&self, run_id: &str) -> Result<Option<RunStatusResponse>, GatewayError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("runId", run_id);
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }
        response
            .json::<RunStatusResponse>()
            .await
            .map(Some)
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

fn transport_error(err: &reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(err.to_string())
    }
}

async fn rejected(response: reqwest::Response) -> GatewayError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody {
            message,
            details: Some(details),
        }) => format!("{message} ({details})"),
        Ok(ErrorBody { message, .. }) => message,
        Err(_) => body.trim().to_string(),
    };
    GatewayError::Rejected { status, message }
}
