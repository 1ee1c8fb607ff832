//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use casefile_api::state::{AppState, Repositories};
use casefile_core::clock::Clock;
use casefile_core::generation::{ArtifactProducer, GenerationRole};
use casefile_identity::domain::password::Passwords;
use casefile_identity::domain::token::TokenSigner;
use casefile_narrative::application::pipeline::PromptPipeline;
use casefile_test_support::{
    InMemoryStore, ManualClock, RoleGenerator, SequenceRng, StaticImageProducer,
};
use chrono::{Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

pub const PUBLIC_BASE_URL: &str = "http://localhost:3000";
pub const TOKEN_SECRET: &str = "integration-test-secret";

pub const INIT_OUTPUT: &str = r#"Rain hammers the windows of Blackwood Manor.
{"truth_table": {"culprit": "Mara", "motive": "inheritance", "public_state_seed": {"visible_evidence": ["torn glove"], "initial_statements": {"Mara": "I was asleep."}}}, "image_hints": {"keyword_suggested": "manor", "tags_suggested": ["fog"]}}"#;
pub const CHAT_OUTPUT: &str = r#"{"reply_text": "The butler glances at the door."}"#;
pub const GUARD_CLEAN: &str = r#"{"violations": []}"#;
pub const SCORE_OUTPUT: &str = r#"{"score_total": 85, "breakdown": {"culprit": 50, "logic": 35}, "grade": "A", "result_text": "Case closed."}"#;

/// A fully wired router over in-memory collaborators, plus handles to them.
pub struct TestApp {
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub store: Arc<InMemoryStore>,
    pub generator: Arc<RoleGenerator>,
    pub tokens: Arc<TokenSigner>,
}

pub fn game_generator() -> RoleGenerator {
    RoleGenerator::new()
        .with(GenerationRole::Initialize, INIT_OUTPUT)
        .with(GenerationRole::Chat, CHAT_OUTPUT)
        .with(GenerationRole::Guard, GUARD_CLEAN)
        .with(GenerationRole::Score, SCORE_OUTPUT)
}

/// Build the full app with the standard scripted backends.
pub fn build_test_app() -> TestApp {
    build_test_app_with(
        game_generator(),
        Arc::new(StaticImageProducer::new(b"\x89PNG-intro".to_vec())),
    )
}

/// Build the full app with custom generation backends.
pub fn build_test_app_with(
    generator: RoleGenerator,
    images: Arc<dyn ArtifactProducer>,
) -> TestApp {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
    ));
    let store = Arc::new(InMemoryStore::new());
    let generator = Arc::new(generator);
    let tokens = Arc::new(TokenSigner::new(TOKEN_SECRET, 3600));

    let state = AppState {
        clock: clock.clone(),
        rng: Arc::new(Mutex::new(SequenceRng::new(vec![7, 11]))),
        repos: Repositories::shared(store.clone()),
        pipeline: PromptPipeline::new(generator.clone()),
        images,
        passwords: Arc::new(Passwords::with_params(1024, 1).unwrap()),
        tokens: tokens.clone(),
        public_base_url: PUBLIC_BASE_URL.into(),
    };

    TestApp {
        router: casefile_api::app(state),
        clock,
        store,
        generator,
        tokens,
    }
}

impl TestApp {
    /// Issue a valid bearer token for `user_id` at the current test time.
    pub fn token_for(&self, user_id: Uuid) -> String {
        self.tokens.issue(user_id, self.clock.now()).unwrap()
    }

    /// Step past the turn cooldown.
    pub fn tick(&self) {
        self.clock.advance(Duration::seconds(2));
    }

    /// Send a request and return status and JSON body.
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        idempotency_key: Option<&str>,
        body: Option<&serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        if let Some(key) = idempotency_key {
            builder = builder.header("idempotency-key", key);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body_bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap()
        };

        (status, json)
    }

    /// Send an authenticated GET request.
    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, serde_json::Value) {
        self.send("GET", uri, Some(token), None, None).await
    }

    /// Send an authenticated, idempotent POST request.
    pub async fn post(
        &self,
        uri: &str,
        token: &str,
        key: &str,
        body: &serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        self.send("POST", uri, Some(token), Some(key), Some(body)).await
    }

    /// Create a session and return its id.
    pub async fn create_session(&self, token: &str, difficulty: &str) -> Uuid {
        let (status, json) = self
            .post(
                "/sessions",
                token,
                &format!("create-{}", Uuid::new_v4()),
                &serde_json::json!({
                    "worldview": "Victorian London",
                    "attribute": "retired inspector",
                    "difficulty": difficulty,
                    "image_tags": ["fog"],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create failed: {json}");
        json["session_id"].as_str().unwrap().parse().unwrap()
    }

    /// Take one turn with a fresh idempotency key.
    pub async fn turn(
        &self,
        token: &str,
        session_id: Uuid,
        input: &str,
    ) -> (StatusCode, serde_json::Value) {
        self.post(
            &format!("/sessions/{session_id}/turn"),
            token,
            &format!("turn-{}", Uuid::new_v4()),
            &serde_json::json!({ "mode": "free", "input_text": input }),
        )
        .await
    }
}
