//! HTTP client for an OpenAI-compatible chat completions API.
//!
//! Provides [`OpenAiClient`], a [`TextGenerator`] that picks a model per
//! generation role and retries once on transient errors.

use std::time::Duration;

use async_trait::async_trait;
use casefile_core::error::DomainError;
use casefile_core::generation::{GenerationRequest, GenerationRole, TextGenerator};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default base URL for the chat completions endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Sampling temperature for every role.
const TEMPERATURE: f32 = 0.8;

/// Which model serves which role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRouting {
    /// Model for initialization and scoring.
    pub story_model: String,
    /// Model for chat turns and guard checks.
    pub chat_model: String,
}

impl ModelRouting {
    /// Returns the model for a role.
    #[must_use]
    pub fn model_for(&self, role: GenerationRole) -> &str {
        match role {
            GenerationRole::Initialize | GenerationRole::Score => &self.story_model,
            GenerationRole::Chat | GenerationRole::Guard => &self.chat_model,
        }
    }
}

impl Default for ModelRouting {
    fn default() -> Self {
        Self {
            story_model: "gpt-4.1".to_owned(),
            chat_model: "gpt-4.1-mini".to_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for chat completions.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    routing: ModelRouting,
    max_retries: u32,
    base_url: String,
}

impl OpenAiClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the API key is not a valid header
    /// value, or `DomainError::Infrastructure` if the HTTP client cannot be
    /// built.
    pub fn new(api_key: &str, routing: ModelRouting) -> Result<Self, DomainError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| DomainError::Validation(format!("invalid API key header value: {e}")))?;
        headers.insert("authorization", bearer);
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| DomainError::Infrastructure(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            routing,
            max_retries: 1,
            base_url: DEFAULT_BASE_URL.to_owned(),
        })
    }

    /// Overrides the endpoint URL (for compatible gateways and wiremock).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, DomainError> {
        let body = CompletionRequest {
            model: self.routing.model_for(request.role),
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: TEMPERATURE,
        };

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, role = %request.role, "retrying completion after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let response = self
                .client
                .post(&self.base_url)
                .json(&body)
                .send()
                .await
                .map_err(|e| DomainError::Upstream(format!("HTTP request failed: {e}")))?;

            let status = response.status();
            debug!(%status, attempt, role = %request.role, "completion response received");

            if status.is_success() {
                let parsed: CompletionResponse = response.json().await.map_err(|e| {
                    DomainError::Upstream(format!("failed to parse completion response: {e}"))
                })?;
                return Ok(parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .unwrap_or_default());
            }

            let error = DomainError::Upstream(format!("completion API returned {status}"));
            if is_transient_error(status) && attempt < self.max_retries {
                last_error = Some(error);
                continue;
            }
            return Err(error);
        }

        Err(last_error
            .unwrap_or_else(|| DomainError::Upstream("completion failed after retries".into())))
    }
}

/// Returns true for HTTP status codes worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> OpenAiClient {
        OpenAiClient::new("test-api-key", ModelRouting::default())
            .unwrap()
            .with_base_url(base_url)
    }

    fn request(role: GenerationRole) -> GenerationRequest {
        GenerationRequest {
            role,
            prompt_version: "chat_v1",
            prompt: "Hello".to_owned(),
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    #[test]
    fn test_model_routing_by_role() {
        let routing = ModelRouting::default();
        assert_eq!(routing.model_for(GenerationRole::Initialize), "gpt-4.1");
        assert_eq!(routing.model_for(GenerationRole::Score), "gpt-4.1");
        assert_eq!(routing.model_for(GenerationRole::Chat), "gpt-4.1-mini");
        assert_eq!(routing.model_for(GenerationRole::Guard), "gpt-4.1-mini");
    }

    #[tokio::test]
    async fn test_generate_returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer test-api-key"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4.1-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("hi there")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let text = client.generate(&request(GenerationRole::Chat)).await.unwrap();

        assert_eq!(text, "hi there");
    }

    #[tokio::test]
    async fn test_generate_uses_story_model_for_initialize() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4.1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        client
            .generate(&request(GenerationRole::Initialize))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_generate_retries_on_429() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("after retry")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let text = client.generate(&request(GenerationRole::Chat)).await.unwrap();

        assert_eq!(text, "after retry");
    }

    #[tokio::test]
    async fn test_generate_fails_on_400_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.generate(&request(GenerationRole::Chat)).await;

        assert!(matches!(result, Err(DomainError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_generate_returns_empty_text_when_no_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let text = client.generate(&request(GenerationRole::Guard)).await.unwrap();

        assert!(text.is_empty());
    }
}
