//! Shared-secret API key check
//!
//! Keys come from a single comma-separated configuration value. When no key
//! is configured enforcement is [`Enforcement::Disabled`] and every request
//! passes, which is the intended mode for local development.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::error::ApiError;

/// Preferred header carrying the key
pub const API_KEY_HEADER: &str = "x-api-key";

type KeyDigest = [u8; 32];

/// Whether requests must present a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enforcement {
    /// No keys configured; every request is let through
    Disabled,
    /// Requests must present one of these keys (stored as SHA-256 digests)
    Required(HashSet<KeyDigest>),
}

/// Accepted API keys, built once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeys {
    enforcement: Enforcement,
}

impl ApiKeys {
    /// Parse a comma-separated key list; blanks are dropped
    pub fn parse(raw: &str) -> Self {
        let keys: HashSet<KeyDigest> = raw
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(digest)
            .collect();

        let enforcement = if keys.is_empty() {
            Enforcement::Disabled
        } else {
            Enforcement::Required(keys)
        };
        Self { enforcement }
    }

    pub fn disabled() -> Self {
        Self {
            enforcement: Enforcement::Disabled,
        }
    }

    pub fn enforcement(&self) -> &Enforcement {
        &self.enforcement
    }

    pub fn is_enforced(&self) -> bool {
        matches!(self.enforcement, Enforcement::Required(_))
    }

    /// Check a candidate key against the configured set.
    ///
    /// Every configured digest is compared so timing does not depend on
    /// which key (if any) matched.
    pub fn accepts(&self, candidate: &str) -> bool {
        match &self.enforcement {
            Enforcement::Disabled => true,
            Enforcement::Required(keys) => {
                let candidate = digest(candidate);
                keys.iter()
                    .fold(false, |found, key| constant_time_eq(key, &candidate) | found)
            }
        }
    }
}

fn digest(key: &str) -> KeyDigest {
    Sha256::digest(key.as_bytes()).into()
}

fn constant_time_eq(a: &KeyDigest, b: &KeyDigest) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Short, non-reversible tag for a rejected key so logs can tell keys apart
pub fn fingerprint(key: &str) -> String {
    hex::encode(&digest(key)[..4])
}

/// Extract the candidate key: `X-API-Key` first, then `Authorization: Bearer`.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
pub fn extract_key(headers: &HeaderMap) -> Option<&str> {
    let from_header = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    from_header.or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                if v.len() >= 7 && v.is_char_boundary(7) && v[..7].eq_ignore_ascii_case("bearer ") {
                    Some(v[7..].trim())
                } else {
                    None
                }
            })
            .filter(|v| !v.is_empty())
    })
}

/// Reject requests without an accepted key before they reach the handler
pub async fn require_api_key(
    State(keys): State<Arc<ApiKeys>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !keys.is_enforced() {
        tracing::debug!("API key enforcement disabled; allowing request");
        return Ok(next.run(req).await);
    }

    let key_fingerprint = match extract_key(req.headers()) {
        Some(candidate) if keys.accepts(candidate) => return Ok(next.run(req).await),
        Some(candidate) => fingerprint(candidate),
        None => "none".to_string(),
    };

    tracing::warn!(
        method = %req.method(),
        path = %req.uri().path(),
        key_fingerprint = %key_fingerprint,
        "rejected request with missing or invalid API key"
    );
    Err(ApiError::Unauthorized)
}
