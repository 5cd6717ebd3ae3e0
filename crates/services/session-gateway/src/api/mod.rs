//! HTTP API for the Session Gateway
//!
//! - `GET /healthz` - Liveness check
//! - `GET /sessions` - List session ids
//! - `GET /sessions/:id` - File sizes for a session
//! - `GET /sessions/:id/results` - Processing results, or 202 while pending
//! - `POST /sessions/upload` - Multipart upload creating a new session (API key)

pub mod sessions;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, MethodRouter},
    Router,
};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

use crate::access_log::{access_log, handle_panic};
use crate::auth::{require_api_key, ApiKeys};
use crate::config::Config;
use crate::error::ApiError;
use crate::store::SessionStore;

/// Content type for JSON bodies, including the raw results file
pub const APPLICATION_JSON: &str = "application/json";

/// Seconds clients should wait before polling results again
pub const RESULTS_RETRY_AFTER: &str = "2";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Session directories on disk
    pub store: Arc<SessionStore>,
    /// Accepted upload keys
    pub api_keys: Arc<ApiKeys>,
    /// Service configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState from configuration
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            store: Arc::new(SessionStore::new(config.storage.sessions_dir.clone())),
            api_keys: Arc::new(ApiKeys::parse(&config.auth.api_keys)),
            config,
        }
    }
}

/// Build the HTTP API router
pub fn build_router(state: AppState) -> Router {
    let upload: MethodRouter<AppState> = post(upload::upload_session)
        .layer::<_, std::convert::Infallible>(middleware::from_fn_with_state(
            state.api_keys.clone(),
            require_api_key,
        ))
        .layer(DefaultBodyLimit::max(state.config.limits.max_upload_bytes));

    Router::new()
        .route("/healthz", get(health_check))
        .route("/sessions", get(sessions::list_sessions))
        .route("/sessions/upload", upload)
        .route("/sessions/:id", get(sessions::get_session))
        .route("/sessions/:id/results", get(sessions::get_results))
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(route_not_found)
        // Middleware layers are applied in reverse order (outermost last).
        // Order of execution: CORS -> access log -> panic catcher -> route
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(access_log))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

async fn route_not_found() -> ApiError {
    ApiError::NotFound("route not found".to_string())
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
