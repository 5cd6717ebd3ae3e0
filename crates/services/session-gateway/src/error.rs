//! API error types
//!
//! Every handler and middleware failure is an [`ApiError`]. Converting one into
//! a response produces the uniform `{"error": true, "reason": ...}` body and
//! attaches an [`ErrorContext`] extension so the access log can report the
//! internal description without it ever reaching the client.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Gateway API error types
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Path parameter is not a usable session id
    #[error("invalid session id: {0:?}")]
    InvalidSessionId(String),

    /// Required multipart field was not supplied
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// Missing or rejected API key
    #[error("missing or invalid API key")]
    Unauthorized,

    /// Resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Route exists but not for this method
    #[error("method not allowed")]
    MethodNotAllowed,

    /// Multipart body could not be read (includes body-limit rejections)
    #[error("multipart error: {0}")]
    Multipart(#[from] MultipartError),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else that is the server's fault
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for gateway operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Client-visible error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: bool,
    pub reason: String,
}

/// Internal description of the failure behind an error response
#[derive(Debug, Clone)]
pub struct ErrorContext(pub String);

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::InvalidSessionId(_) | ApiError::MissingField(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Multipart(e) => e.status(),
            ApiError::Io(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Reason string safe to show to clients
    fn reason(&self) -> String {
        match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) => msg.clone(),
            ApiError::InvalidSessionId(_) => "invalid session id".to_string(),
            ApiError::MissingField(_) | ApiError::MethodNotAllowed => self.to_string(),
            ApiError::Unauthorized => "Missing or invalid API key".to_string(),
            ApiError::Multipart(e) => e.body_text(),
            ApiError::Io(_) | ApiError::Internal(_) => "internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: true,
            reason: self.reason(),
        };
        let mut response = (status, Json(body)).into_response();
        response
            .extensions_mut()
            .insert(ErrorContext(self.to_string()));
        response
    }
}
