//! API key enforcement on the upload route.

mod common;

use axum::http::StatusCode;
use common::{Part, TestServer};
use serde_json::json;

const VIDEO: &[u8] = b"0123456789";

#[tokio::test]
async fn test_no_keys_configured_allows_upload() {
    let server = TestServer::new();

    let response = server.upload(&[Part::File("video", VIDEO)], &[]).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.json()["sessionID"].is_string());
}

#[tokio::test]
async fn test_valid_custom_header() {
    let server = TestServer::with_api_keys("k1,k2");

    let response = server
        .upload(&[Part::File("video", VIDEO)], &[("X-API-Key", "k1")])
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_key_is_unauthorized() {
    let server = TestServer::with_api_keys("k1,k2");

    let response = server
        .upload(&[Part::File("video", VIDEO)], &[("X-API-Key", "k3")])
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.json(),
        json!({ "error": true, "reason": "Missing or invalid API key" })
    );
    assert_eq!(server.get("/sessions").await.json(), json!([]));
}

#[tokio::test]
async fn test_missing_key_is_unauthorized() {
    let server = TestServer::with_api_keys("k1,k2");

    let response = server.upload(&[Part::File("video", VIDEO)], &[]).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    // Rejected before the handler stages anything
    assert!(!server.root().exists());
}

#[tokio::test]
async fn test_bearer_fallback() {
    let server = TestServer::with_api_keys("k1,k2");

    let response = server
        .upload(&[Part::File("video", VIDEO)], &[("Authorization", "Bearer k2")])
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_custom_header_takes_precedence_over_bearer() {
    let server = TestServer::with_api_keys("k1,k2");

    let response = server
        .upload(
            &[Part::File("video", VIDEO)],
            &[("X-API-Key", "k3"), ("Authorization", "Bearer k2")],
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_whitespace_in_configured_keys() {
    let server = TestServer::with_api_keys("  k1 , , k2  ");

    for key in ["k1", "k2"] {
        let response = server
            .upload(&[Part::File("video", VIDEO)], &[("X-API-Key", key)])
            .await;
        assert_eq!(response.status, StatusCode::OK, "key {key}");
    }
}

#[tokio::test]
async fn test_read_routes_do_not_require_key() {
    let server = TestServer::with_api_keys("k1");

    assert_eq!(server.get("/healthz").await.status, StatusCode::OK);
    assert_eq!(server.get("/sessions").await.status, StatusCode::OK);
    assert_eq!(server.get("/sessions/abc").await.status, StatusCode::OK);
    assert_eq!(server.get("/sessions/abc/results").await.status, StatusCode::ACCEPTED);
}
