//! HTTP client for an image generation endpoint returning base64 images.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use casefile_core::error::DomainError;
use casefile_core::generation::{Artifact, ArtifactProducer};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default image generation endpoint.
pub const DEFAULT_BASE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/imagen-3.0-generate-001:generateImages";

const STYLE_PREFIX: &str = "cinematic illustration, semi-realistic, no text, no gore, wide shot, \
people allowed but not close-up faces, emphasize environment and objects";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageRequest<'a> {
    prompt: &'a str,
    sample_count: u32,
    aspect_ratio: &'static str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    images: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    #[serde(default)]
    image: String,
}

/// Builds the image prompt from tag and keyword hints.
#[must_use]
pub fn image_prompt(tags: &[String], keyword: &str) -> String {
    format!("{STYLE_PREFIX}, {}, keyword: {keyword}", tags.join(", "))
}

/// Produces intro images through the image generation API.
#[derive(Debug, Clone)]
pub struct ImagenClient {
    client: reqwest::Client,
    base_url: String,
}

impl ImagenClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the API key is not a valid header
    /// value, or `DomainError::Infrastructure` if the HTTP client cannot be
    /// built.
    pub fn new(api_key: &str) -> Result<Self, DomainError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| DomainError::Validation(format!("invalid API key header value: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| DomainError::Infrastructure(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_owned(),
        })
    }

    /// Overrides the endpoint URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl ArtifactProducer for ImagenClient {
    async fn produce(&self, tags: &[String], keyword: &str) -> Result<Artifact, DomainError> {
        let prompt = image_prompt(tags, keyword);
        let body = ImageRequest {
            prompt: &prompt,
            sample_count: 1,
            aspect_ratio: "16:9",
        };

        let response = self
            .client
            .post(&self.base_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DomainError::Upstream(format!("image request failed: {e}")))?;

        let status = response.status();
        debug!(%status, "image response received");
        if !status.is_success() {
            return Err(DomainError::Upstream(format!("image API returned {status}")));
        }

        let parsed: ImageResponse = response
            .json()
            .await
            .map_err(|e| DomainError::Upstream(format!("failed to parse image response: {e}")))?;
        let encoded = parsed
            .images
            .into_iter()
            .next()
            .map(|i| i.image)
            .filter(|i| !i.is_empty())
            .ok_or_else(|| DomainError::Upstream("image response contained no image".into()))?;
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| DomainError::Upstream(format!("image payload is not base64: {e}")))?;

        Ok(Artifact {
            bytes,
            content_type: "image/png".to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_image_prompt_includes_tags_and_keyword() {
        let prompt = image_prompt(&["fog".to_owned(), "pier".to_owned()], "lighthouse");
        assert!(prompt.starts_with("cinematic illustration"));
        assert!(prompt.ends_with("fog, pier, keyword: lighthouse"));
    }

    #[tokio::test]
    async fn test_produce_decodes_first_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({"sampleCount": 1, "aspectRatio": "16:9"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "images": [{"image": STANDARD.encode(b"png-bytes")}]
            })))
            .mount(&server)
            .await;

        let client = ImagenClient::new("test-key").unwrap().with_base_url(server.uri());
        let artifact = client.produce(&["fog".to_owned()], "pier").await.unwrap();

        assert_eq!(artifact.bytes, b"png-bytes");
        assert_eq!(artifact.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_produce_fails_when_no_image_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"images": []})))
            .mount(&server)
            .await;

        let client = ImagenClient::new("test-key").unwrap().with_base_url(server.uri());
        let result = client.produce(&[], "").await;

        assert!(matches!(result, Err(DomainError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_produce_fails_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ImagenClient::new("test-key").unwrap().with_base_url(server.uri());
        let result = client.produce(&[], "").await;

        assert!(matches!(result, Err(DomainError::Upstream(_))));
    }
}
