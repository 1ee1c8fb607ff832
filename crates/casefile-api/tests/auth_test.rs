//! Integration tests for signup, login, and the profile endpoints.

mod common;

use axum::http::StatusCode;
use casefile_core::clock::Clock;
use serde_json::json;

fn credentials(email: &str, password: &str) -> serde_json::Value {
    json!({ "email": email, "password": password })
}

#[tokio::test]
async fn test_signup_then_login_and_read_profile() {
    let app = common::build_test_app();

    // POST /auth/signup
    let (status, json) = app
        .send(
            "POST",
            "/auth/signup",
            None,
            Some("signup-1"),
            Some(&credentials("  Holmes@Example.com ", "baker-street-221b")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["token"].as_str().is_some());

    // POST /auth/login with the normalized email
    let (status, json) = app
        .send(
            "POST",
            "/auth/login",
            None,
            Some("login-1"),
            Some(&credentials("holmes@example.com", "baker-street-221b")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = json["token"].as_str().unwrap().to_owned();

    // GET /me
    let (status, json) = app.get("/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["email"], "holmes@example.com");
    assert!(json["nickname"].is_null());
    assert!(json.get("password_hash").is_none());
}

#[tokio::test]
async fn test_signup_retry_with_same_key_logs_in_the_same_account() {
    // Arrange
    let app = common::build_test_app();
    let body = credentials("watson@example.com", "practitioner");

    // Act
    let (_, first) = app
        .send("POST", "/auth/signup", None, Some("same-key"), Some(&body))
        .await;
    app.tick();
    let (status, second) = app
        .send("POST", "/auth/signup", None, Some("same-key"), Some(&body))
        .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    let first = app.tokens.verify(first["token"].as_str().unwrap(), app.clock.now());
    let second = app.tokens.verify(second["token"].as_str().unwrap(), app.clock.now());
    assert_eq!(first.unwrap().user_id, second.unwrap().user_id);
}

#[tokio::test]
async fn test_signup_retry_with_wrong_password_returns_409() {
    let app = common::build_test_app();
    app.send(
        "POST",
        "/auth/signup",
        None,
        Some("same-key"),
        Some(&credentials("watson@example.com", "practitioner")),
    )
    .await;

    let (status, json) = app
        .send(
            "POST",
            "/auth/signup",
            None,
            Some("same-key"),
            Some(&credentials("watson@example.com", "WRONG-password")),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "conflict");
    assert!(json.get("token").is_none());
}

#[tokio::test]
async fn test_login_with_reused_key_still_checks_password() {
    // Arrange
    let app = common::build_test_app();
    app.send(
        "POST",
        "/auth/signup",
        None,
        Some("signup"),
        Some(&credentials("victim@example.com", "correct-horse")),
    )
    .await;
    let (status, _) = app
        .send(
            "POST",
            "/auth/login",
            None,
            Some("login-key"),
            Some(&credentials("victim@example.com", "correct-horse")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Act
    let (status, json) = app
        .send(
            "POST",
            "/auth/login",
            None,
            Some("login-key"),
            Some(&credentials("victim@example.com", "WRONG-password")),
        )
        .await;

    // Assert
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthorized");
    assert!(json.get("token").is_none());
}

#[tokio::test]
async fn test_issued_tokens_are_not_stored_for_replay() {
    let app = common::build_test_app();
    let body = credentials("holmes@example.com", "baker-street-221b");

    let (_, signed_up) = app
        .send("POST", "/auth/signup", None, Some("signup"), Some(&body))
        .await;
    let (_, logged_in) = app
        .send("POST", "/auth/login", None, Some("login"), Some(&body))
        .await;

    let stored = app.store.idempotent_responses();
    assert_eq!(stored.len(), 1);
    for token in [&signed_up["token"], &logged_in["token"]] {
        let token = token.as_str().unwrap();
        assert!(stored.iter().all(|r| !r.to_string().contains(token)));
    }
}

#[tokio::test]
async fn test_signup_with_taken_email_returns_409() {
    let app = common::build_test_app();
    let body = credentials("watson@example.com", "practitioner");
    app.send("POST", "/auth/signup", None, Some("a"), Some(&body))
        .await;

    let (status, json) = app
        .send("POST", "/auth/signup", None, Some("b"), Some(&body))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "conflict");
}

#[tokio::test]
async fn test_signup_rejects_short_password() {
    let app = common::build_test_app();

    let (status, json) = app
        .send(
            "POST",
            "/auth/signup",
            None,
            Some("k"),
            Some(&credentials("lestrade@example.com", "short")),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn test_login_with_wrong_password_returns_401() {
    let app = common::build_test_app();
    app.send(
        "POST",
        "/auth/signup",
        None,
        Some("signup"),
        Some(&credentials("holmes@example.com", "baker-street-221b")),
    )
    .await;

    let (status, json) = app
        .send(
            "POST",
            "/auth/login",
            None,
            Some("login"),
            Some(&credentials("holmes@example.com", "wrong-password")),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn test_signup_without_idempotency_key_returns_400() {
    let app = common::build_test_app();

    let (status, json) = app
        .send(
            "POST",
            "/auth/signup",
            None,
            None,
            Some(&credentials("holmes@example.com", "baker-street-221b")),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "idempotency_key_required");
}

#[tokio::test]
async fn test_signup_with_malformed_body_returns_invalid_body() {
    let app = common::build_test_app();

    let (status, json) = app
        .send(
            "POST",
            "/auth/signup",
            None,
            Some("k"),
            Some(&json!({ "email": 42 })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_body");
}

#[tokio::test]
async fn test_me_requires_valid_token() {
    let app = common::build_test_app();

    let (missing, _) = app.send("GET", "/me", None, None, None).await;
    let (garbage, json) = app.get("/me", "not.a.token").await;

    assert_eq!(missing, StatusCode::UNAUTHORIZED);
    assert_eq!(garbage, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn test_set_nickname_updates_profile() {
    let app = common::build_test_app();
    let (_, json) = app
        .send(
            "POST",
            "/auth/signup",
            None,
            Some("signup"),
            Some(&credentials("holmes@example.com", "baker-street-221b")),
        )
        .await;
    let token = json["token"].as_str().unwrap().to_owned();

    let (status, json) = app
        .send(
            "PUT",
            "/me/nickname",
            Some(&token),
            Some("nick-1"),
            Some(&json!({ "nickname": "  Sherlock " })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "ok": true }));

    let (_, profile) = app.get("/me", &token).await;
    assert_eq!(profile["nickname"], "Sherlock");
}

#[tokio::test]
async fn test_set_nickname_rejects_overlong_value() {
    let app = common::build_test_app();
    let token = app.token_for(uuid::Uuid::new_v4());

    let (status, json) = app
        .send(
            "PUT",
            "/me/nickname",
            Some(&token),
            Some("nick-1"),
            Some(&json!({ "nickname": "x".repeat(33) })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}
