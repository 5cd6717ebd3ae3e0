//! Session query endpoints
//!
//! Read-only views over the session directories: listing, per-session file
//! sizes, and polling for the results written by the processing pipeline.

use std::collections::BTreeMap;

use axum::{
    body::Body,
    extract::{rejection::PathRejection, Path, State},
    http::{
        header::{CONTENT_TYPE, RETRY_AFTER},
        StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use super::{AppState, APPLICATION_JSON, RESULTS_RETRY_AFTER};
use crate::config::MissingSessionPolicy;
use crate::error::{ApiError, ApiResult};
use crate::store::SessionId;

/// Response body for session summary
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session ID
    pub id: String,

    /// Artifact file name to size in bytes, present files only
    pub files: BTreeMap<String, u64>,
}

/// Body returned while results are still being produced
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessingStatus {
    pub status: String,
}

/// Turn the raw path segment into a validated id, keeping axum's own
/// rejections (e.g. invalid UTF-8) on the uniform error path
fn parse_session_id(raw: Result<Path<String>, PathRejection>) -> ApiResult<SessionId> {
    let Path(raw) = raw.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    SessionId::parse(&raw)
}

/// List session ids
///
/// GET /sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.store.list().await)
}

/// Get file sizes for a session
///
/// GET /sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    session_id: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<SessionSummary>> {
    let id = parse_session_id(session_id)?;
    let summary = state.store.summary(&id).await;

    if !summary.exists && state.config.sessions.missing_session == MissingSessionPolicy::NotFound {
        return Err(ApiError::NotFound(format!("Session {} not found", id)));
    }

    Ok(Json(SessionSummary {
        id: id.to_string(),
        files: summary.files,
    }))
}

/// Stream `results.json`, or tell the client to poll again
///
/// GET /sessions/:id/results
pub async fn get_results(
    State(state): State<AppState>,
    session_id: Result<Path<String>, PathRejection>,
) -> ApiResult<Response> {
    let id = parse_session_id(session_id)?;

    match state.store.open_results(&id).await? {
        Some(file) => Ok((
            StatusCode::OK,
            [(CONTENT_TYPE, APPLICATION_JSON)],
            Body::from_stream(ReaderStream::new(file)),
        )
            .into_response()),
        None => {
            tracing::debug!(session_id = %id, "results not ready");
            Ok((
                StatusCode::ACCEPTED,
                [(RETRY_AFTER, RESULTS_RETRY_AFTER)],
                Json(ProcessingStatus {
                    status: "processing".to_string(),
                }),
            )
                .into_response())
        }
    }
}
