//! Integration tests for the health endpoint.

mod common;

use axum::http::StatusCode;

#[tokio::test]
async fn test_health_returns_ok_without_auth() {
    let app = common::build_test_app();

    let (status, json) = app.send("GET", "/health", None, None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "casefile-api");
}
