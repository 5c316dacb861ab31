//! HTTP surface of the gateway.
//!
//! - `POST /terraform`: validate, record and dispatch a run
//! - `GET  /terraform?runId=`: read a run
//! - `PUT  /terraform/runs/{run_id}`: workflow-engine progress callback
//! - `GET  /health`: liveness probe

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderName, HeaderValue, Method};
use reclaim_common::{
    DispatchAccepted, DispatchRequest, Mode, RunRecord, RunUpdate, state_key, validate_region,
    validate_run_id, validate_state_key,
};
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::dispatcher::{ClientPayload, WorkflowDispatcher};
use crate::error::ApiError;
use crate::store::{DISPATCH_FAILED, InsertOutcome, RunStore};

const API_KEY_HEADER: &str = "x-api-key";
const DEFAULT_CLOUD: &str = "aws";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub store: Arc<dyn RunStore>,
    pub dispatcher: Arc<dyn WorkflowDispatcher>,
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .route("/terraform", get(get_run).post(dispatch_run))
        .route("/terraform/runs/{run_id}", put(update_run))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(API_KEY_HEADER),
        ])
        .max_age(Duration::from_secs(86_400));
    let origin = config.cors_allow_origin.trim();
    if origin == "*" {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origin
        .split(',')
        .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

// ── Auth ─────────────────────────────────────────────────────────────────────

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn require_api_key(config: &GatewayConfig, headers: &HeaderMap) -> Result<(), ApiError> {
    let expected = config.api_key().ok_or(ApiError::Misconfigured("api_key"))?;
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

fn require_callback_token(config: &GatewayConfig, headers: &HeaderMap) -> Result<(), ApiError> {
    let expected = config
        .callback_token()
        .ok_or(ApiError::Misconfigured("callback_token"))?;
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();
    if constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

// ── Body parsing ─────────────────────────────────────────────────────────────

/// Dispatch body as sent by any client; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDispatch {
    #[serde(rename = "event_type")]
    event_type: Option<String>,
    mode: Option<String>,
    /// Older clients send `action: apply|destroy`.
    action: Option<String>,
    request_id: Option<String>,
    state_key: Option<String>,
    region: Option<String>,
    clouds: Option<Vec<String>>,
}

fn parse_json<T: serde::de::DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|_| ApiError::bad_request("Invalid JSON payload"))
}

fn mode_of(token: &str) -> Mode {
    if token.trim().eq_ignore_ascii_case("destroy") {
        Mode::Destroy
    } else {
        Mode::Provision
    }
}

/// Resolve defaults and validate. Returns the request and the clouds list.
fn resolve(raw: RawDispatch, config: &GatewayConfig) -> Result<(DispatchRequest, Vec<String>), ApiError> {
    let declared = raw.mode.as_deref().or(raw.action.as_deref()).map(mode_of);
    let event = raw.event_type.as_deref().map(mode_of);
    if let (Some(declared), Some(event)) = (declared, event) {
        if declared != event {
            return Err(ApiError::bad_request(format!(
                "event_type '{event}' does not match mode '{declared}'"
            )));
        }
    }
    let mode = declared.or(event).unwrap_or_default();

    let request_id = raw
        .request_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    validate_run_id(&request_id).map_err(|e| ApiError::bad_request(format!("Invalid requestId: {e}")))?;

    let state_key = raw
        .state_key
        .filter(|k| !k.trim().is_empty())
        .unwrap_or_else(|| state_key(&config.state_namespace, &request_id));
    validate_state_key(&state_key).map_err(|e| ApiError::bad_request(format!("Invalid stateKey: {e}")))?;

    let region = raw
        .region
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| config.default_region.clone());
    validate_region(&region).map_err(|e| ApiError::bad_request(format!("Invalid region: {e}")))?;

    let clouds = raw
        .clouds
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| vec![DEFAULT_CLOUD.to_string()]);

    Ok((DispatchRequest::new(mode, request_id, state_key, region), clouds))
}

fn accepted(request_id: &str, state_key: &str, mode: Mode, region: &str) -> Response {
    let body = DispatchAccepted {
        request_id: request_id.to_string(),
        run_id: Some(request_id.to_string()),
        state_key: state_key.to_string(),
        mode,
        region: region.to_string(),
    };
    (StatusCode::ACCEPTED, Json(body)).into_response()
}

fn accepted_existing(existing: &RunRecord, request: &DispatchRequest) -> Response {
    accepted(
        &existing.run_id,
        existing.state_key.as_deref().unwrap_or(&request.state_key),
        existing.mode.unwrap_or(request.mode),
        existing.region.as_deref().unwrap_or(&request.region),
    )
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn dispatch_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    require_api_key(&state.config, &headers)?;
    let raw: RawDispatch = parse_json(&body)?;
    let (request, clouds) = resolve(raw, &state.config)?;
    if !state.dispatcher.is_configured() {
        return Err(ApiError::Misconfigured("workflow_token"));
    }

    let record = RunRecord::queued(&request, clouds, Utc::now());
    match state.store.insert_if_absent(&record).await? {
        InsertOutcome::Inserted => {}
        InsertOutcome::Exists(existing) if existing.status == DISPATCH_FAILED => {
            if state.store.reclaim_failed(&record).await? {
                tracing::info!(run_id = %request.request_id, "re-dispatching after failed dispatch");
            } else {
                // Another retry claimed the row first.
                tracing::info!(run_id = %existing.run_id, "concurrent retry ignored");
                return Ok(accepted_existing(&existing, &request));
            }
        }
        InsertOutcome::Exists(existing) => {
            tracing::info!(run_id = %existing.run_id, status = %existing.status, "duplicate dispatch ignored");
            return Ok(accepted_existing(&existing, &request));
        }
    }

    let payload = ClientPayload {
        request_id: request.request_id.clone(),
        aws_region: request.region.clone(),
        mode: request.mode,
        state_key: request.state_key.clone(),
    };
    tracing::info!(
        run_id = %request.request_id,
        mode = %request.mode,
        region = %request.region,
        state_key = %request.state_key,
        "dispatching workflow"
    );
    if let Err(failure) = state.dispatcher.dispatch(&payload).await {
        let details = failure.details();
        tracing::warn!(run_id = %request.request_id, error = %failure, details = %details, "workflow dispatch failed");
        let marked = RunUpdate {
            status: DISPATCH_FAILED.to_string(),
            logs: Some(format!("{failure}: {details}")),
        };
        state
            .store
            .apply_update(&record.run_id, &marked, Utc::now())
            .await?;
        return Err(ApiError::Upstream {
            message: failure.to_string(),
            details,
        });
    }

    Ok(accepted(
        &request.request_id,
        &request.state_key,
        request.mode,
        &request.region,
    ))
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    #[serde(rename = "runId")]
    run_id: Option<String>,
}

async fn get_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<StatusQuery>,
) -> Result<Response, ApiError> {
    require_api_key(&state.config, &headers)?;
    let run_id = query
        .run_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing runId"))?;
    validate_run_id(&run_id).map_err(|e| ApiError::bad_request(format!("Invalid runId: {e}")))?;
    let record = state
        .store
        .get(&run_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Run not found"))?;
    Ok(Json(record.to_status_response()).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct RawUpdate {
    status: Option<String>,
    logs: Option<String>,
}

async fn update_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    require_callback_token(&state.config, &headers)?;
    validate_run_id(&run_id).map_err(|e| ApiError::bad_request(format!("Invalid run id: {e}")))?;
    let raw: RawUpdate = parse_json(&body)?;
    let status = raw
        .status
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing status"))?;

    let update = RunUpdate {
        status,
        logs: raw.logs,
    };
    let record = state
        .store
        .apply_update(&run_id, &update, Utc::now())
        .await?
        .ok_or_else(|| ApiError::not_found("Run not found"))?;
    tracing::info!(run_id = %run_id, status = %record.status, "run updated");
    Ok(Json(record.to_status_response()).into_response())
}
