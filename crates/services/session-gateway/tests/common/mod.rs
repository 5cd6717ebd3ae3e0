//! Common test utilities: a router over a temporary session root and
//! helpers for building requests against it.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use session_gateway::api::{build_router, AppState};
use session_gateway::config::{Config, MissingSessionPolicy};
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "session-gateway-test-boundary";

/// Router plus the temporary directory backing it
pub struct TestServer {
    pub router: Router,
    pub dir: TempDir,
}

impl TestServer {
    /// Server with no API keys and the default missing-session policy
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_api_keys(keys: &str) -> Self {
        let keys = keys.to_string();
        Self::with_config(move |config| config.auth.api_keys = keys)
    }

    pub fn with_missing_session(policy: MissingSessionPolicy) -> Self {
        Self::with_config(move |config| config.sessions.missing_session = policy)
    }

    pub fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut config = Config::default();
        config.storage.sessions_dir = dir.path().join("sessions");
        customize(&mut config);

        let router = build_router(AppState::new(Arc::new(config)));
        Self { router, dir }
    }

    /// Session root (not created until the first upload)
    pub fn root(&self) -> PathBuf {
        self.dir.path().join("sessions")
    }

    pub fn session_dir(&self, id: &str) -> PathBuf {
        self.root().join(id)
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    /// Upload parts with optional extra headers; returns the response
    pub async fn upload(&self, parts: &[Part<'_>], headers: &[(&str, &str)]) -> TestResponse {
        self.send(upload_request(parts, headers)).await
    }

    /// Upload and return the new session id, asserting success
    pub async fn upload_ok(&self, parts: &[Part<'_>]) -> String {
        let response = self.upload(parts, &[]).await;
        assert_eq!(response.status, StatusCode::OK, "upload failed: {:?}", response.text());
        response.json()["sessionID"]
            .as_str()
            .expect("sessionID in ack")
            .to_string()
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("JSON body")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// One multipart part
pub enum Part<'a> {
    File(&'a str, &'a [u8]),
    Text(&'a str, &'a str),
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File(name, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}.bin\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text(name, text) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                body.extend_from_slice(text.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(parts: &[Part<'_>], headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::post("/sessions/upload").header(
        "content-type",
        format!("multipart/form-data; boundary={}", BOUNDARY),
    );
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(multipart_body(parts))).unwrap()
}

/// Entries currently left in the staging area
pub fn staging_entries(root: &Path) -> usize {
    std::fs::read_dir(root.join(session_gateway::store::STAGING_DIR))
        .map(|entries| entries.count())
        .unwrap_or(0)
}
