//! Request correlation and access logging
//!
//! Wraps every request: resolves a correlation id, runs the rest of the stack
//! inside a `request` span carrying that id, then emits exactly one access-log
//! event once the response is known. Responses built from an
//! [`ApiError`](crate::error::ApiError) carry an [`ErrorContext`] and are logged
//! at error level with the internal description.

use std::any::Any;
use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request},
    http::{header::USER_AGENT, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{ApiError, ErrorContext};

/// Correlation id header, read on the way in and echoed on the way out
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longer client-supplied ids are truncated in log fields only
const MAX_LOGGED_REQUEST_ID_LEN: usize = 128;

/// Correlation id for one request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a new random request id
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Log-safe copy of a client-provided id.
    ///
    /// Non-UTF-8 bytes are replaced, control characters escaped and the
    /// result truncated. The header itself is echoed untouched.
    pub fn from_client(value: &HeaderValue) -> Self {
        let mut sanitized = String::new();
        for c in String::from_utf8_lossy(value.as_bytes())
            .chars()
            .take(MAX_LOGGED_REQUEST_ID_LEN)
        {
            if c.is_control() {
                sanitized.extend(c.escape_default());
            } else {
                sanitized.push(c);
            }
        }
        Self(sanitized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Id for the log plus the header value to echo back.
///
/// Any non-empty inbound value is reused as-is. Otherwise a fresh id is
/// generated and echoed.
fn resolve_request_id(req: &Request) -> (RequestId, Option<HeaderValue>) {
    match req.headers().get(REQUEST_ID_HEADER) {
        Some(value) if !value.is_empty() => (RequestId::from_client(value), Some(value.clone())),
        _ => {
            let id = RequestId::new();
            let echo = HeaderValue::from_str(id.as_str()).ok();
            (id, echo)
        }
    }
}

/// Access/timing middleware, meant to be the outermost layer of the router
pub async fn access_log(mut req: Request, next: Next) -> Response {
    let (request_id, echo) = resolve_request_id(&req);
    req.extensions_mut().insert(request_id.clone());

    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_owned();
    let client_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string());

    let span = tracing::info_span!("request", request_id = %request_id);
    let started = Instant::now();

    let mut response = next.run(req).instrument(span.clone()).await;

    let latency_ms = started.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    match response.extensions().get::<ErrorContext>() {
        Some(ErrorContext(error)) => tracing::error!(
            parent: &span,
            method = %method,
            path = %path,
            status,
            latency_ms,
            user_agent = %user_agent,
            client_ip = %client_ip,
            request_id = %request_id,
            error = %error,
            "request failed"
        ),
        None => tracing::info!(
            parent: &span,
            method = %method,
            path = %path,
            status,
            latency_ms,
            user_agent = %user_agent,
            client_ip = %client_ip,
            request_id = %request_id,
            "request completed"
        ),
    }

    if let Some(value) = echo {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Turn a handler panic into a regular 500 error response
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::Internal(format!("handler panicked: {}", detail)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_id(value: HeaderValue) -> Request {
        axum::http::Request::builder()
            .header(REQUEST_ID_HEADER, value)
            .body(axum::body::Body::empty())
            .unwrap()
    }

    #[test]
    fn test_request_id_from_client_keeps_valid_ids() {
        let id = RequestId::from_client(&HeaderValue::from_static("abc-123"));
        assert_eq!(id.as_str(), "abc-123");
    }

    #[test]
    fn test_request_id_log_copy_is_escaped_and_bounded() {
        let id = RequestId::from_client(&HeaderValue::from_static("a\tb"));
        assert_eq!(id.as_str(), "a\\tb");

        let long = HeaderValue::from_str(&"x".repeat(MAX_LOGGED_REQUEST_ID_LEN + 50)).unwrap();
        assert_eq!(RequestId::from_client(&long).as_str().len(), MAX_LOGGED_REQUEST_ID_LEN);

        let opaque = HeaderValue::from_bytes(b"id-\xff").unwrap();
        assert_eq!(RequestId::from_client(&opaque).as_str(), "id-\u{fffd}");
    }

    #[test]
    fn test_resolve_reuses_inbound_value_unchanged() {
        let long = HeaderValue::from_str(&"y".repeat(200)).unwrap();
        let (_, echo) = resolve_request_id(&request_with_id(long.clone()));
        assert_eq!(echo, Some(long));

        let tabbed = HeaderValue::from_static("a\tb");
        let (logged, echo) = resolve_request_id(&request_with_id(tabbed.clone()));
        assert_eq!(echo, Some(tabbed));
        assert_eq!(logged.as_str(), "a\\tb");
    }

    #[test]
    fn test_resolve_generates_when_absent_or_empty() {
        let (id, echo) = resolve_request_id(&request_with_id(HeaderValue::from_static("")));
        assert!(Uuid::parse_str(id.as_str()).is_ok());
        assert_eq!(echo.unwrap().to_str().unwrap(), id.as_str());
    }

    #[test]
    fn test_handle_panic_is_internal_error() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        let context = response.extensions().get::<ErrorContext>().unwrap();
        assert!(context.0.contains("boom"));
    }
}
