//! HTTP request handlers.

use crate::server::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use followscan_core::{
    CoverageStats, FollowscanError, MergedRecord, RunStatus, SnapshotOrigin, TriggerOutcome,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Error returned by handlers, rendered as `{"error": "..."}`.
pub enum ApiError {
    Core(FollowscanError),
    Unauthorized,
}

impl From<FollowscanError> for ApiError {
    fn from(err: FollowscanError) -> Self {
        ApiError::Core(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Core(err) => (
                StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                err.to_string(),
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "missing or invalid bearer token".to_string(),
            ),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Body of `GET /results`.
#[derive(Debug, Serialize)]
pub struct ResultsResponse<'a> {
    pub data: &'a [MergedRecord],
    pub completed_at: DateTime<Utc>,
    pub origin: SnapshotOrigin,
    pub coverage: CoverageStats,
}

/// Body of `POST /results`.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub data: Vec<MergedRecord>,
}

pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

pub async fn handle_run(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.orchestrator.trigger().await {
        TriggerOutcome::Accepted { run_id } => (
            StatusCode::ACCEPTED,
            Json(json!({"status": "accepted", "run_id": run_id})),
        ),
        TriggerOutcome::Busy => (StatusCode::CONFLICT, Json(json!({"status": "busy"}))),
    }
}

pub async fn handle_cancel(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = if state.orchestrator.cancel().await {
        "cancelling"
    } else {
        "idle"
    };
    Json(json!({ "status": status }))
}

pub async fn handle_status(State(state): State<Arc<AppState>>) -> Json<RunStatus> {
    Json(state.orchestrator.status())
}

pub async fn handle_get_results(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.orchestrator.store().get().await;
    Json(ResultsResponse {
        data: &snapshot.data,
        completed_at: snapshot.completed_at,
        origin: snapshot.origin,
        coverage: snapshot.coverage(),
    })
    .into_response()
}

/// Replace the snapshot with a well-formed externally produced set.
///
/// The body is parsed here rather than by the `Json` extractor so every
/// malformed payload is a 400 with the parser's message.
pub async fn handle_post_results(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(state.ingest_token.as_deref(), &headers)?;

    let request: IngestRequest = serde_json::from_slice(&body).map_err(|e| {
        debug!("Rejected results payload: {}", e);
        FollowscanError::Json {
            message: format!("invalid results payload: {}", e),
            source: Some(e),
        }
    })?;

    let count = state.orchestrator.store().ingest(request.data).await?;
    info!("Ingested {} records", count);
    Ok(Json(json!({ "count": count })))
}

fn authorize(expected: Option<&str>, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    match presented {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => Ok(()),
        _ => {
            warn!("Rejected results ingestion without a valid token");
            Err(ApiError::Unauthorized)
        }
    }
}

/// Byte comparison whose running time does not depend on where the inputs
/// first differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_authorize_without_configured_token() {
        assert!(authorize(None, &HeaderMap::new()).is_ok());
    }

    #[test]
    fn test_authorize_checks_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(authorize(Some("s3cret"), &headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer wrong"));
        assert!(authorize(Some("s3cret"), &headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer s3cret"));
        assert!(authorize(Some("s3cret"), &headers).is_ok());
    }

    #[test]
    fn test_token_comparison() {
        assert!(constant_time_eq(b"s3cret", b"s3cret"));
        assert!(!constant_time_eq(b"s3cret", b"s3creT"));
        assert!(!constant_time_eq(b"s3cret", b"s3cre"));
        assert!(!constant_time_eq(b"", b"s3cret"));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer s3cre"));
        assert!(authorize(Some("s3cret"), &headers).is_err());
    }

    #[test]
    fn test_validation_errors_render_as_bad_request() {
        let response =
            ApiError::from(FollowscanError::validation("rank", "duplicate rank 1")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthorized.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
