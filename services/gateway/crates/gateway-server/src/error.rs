//! HTTP error mapping for gateway handlers.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reclaim_common::ErrorBody;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    /// Required server configuration is missing.
    #[error("Server misconfiguration")]
    Misconfigured(&'static str),

    #[error("{message}")]
    Upstream { message: String, details: String },

    #[error("Run store unavailable")]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Misconfigured(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = match &self {
            Self::Upstream { details, .. } => Some(details.clone()),
            Self::Misconfigured(what) => {
                tracing::error!(missing = what, "rejecting request: server misconfigured");
                None
            }
            Self::Store(err) => {
                tracing::error!(error = %err, "run store failure");
                None
            }
            _ => None,
        };
        let body = ErrorBody {
            message: self.to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}
