//! Server configuration, read once from the environment at startup.

use crate::error::AppError;

/// Default token lifetime: 30 days.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 2_592_000;

/// Runtime configuration for the API server.
#[derive(Clone)]
pub struct AppConfig {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// HMAC secret for session tokens.
    pub token_secret: String,
    /// Token lifetime in seconds.
    pub token_ttl_secs: i64,
    /// Text generation API key.
    pub openai_api_key: String,
    /// Override for the text generation endpoint.
    pub openai_base_url: Option<String>,
    /// Model used for chat and guard.
    pub chat_model: String,
    /// Model used for initialization and scoring.
    pub story_model: String,
    /// Image generation API key.
    pub gemini_api_key: String,
    /// Override for the image generation endpoint.
    pub image_base_url: Option<String>,
    /// Base URL artifact links are built on.
    pub public_base_url: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[redacted]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("token_secret", &"[redacted]")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("openai_api_key", &"[redacted]")
            .field("openai_base_url", &self.openai_base_url)
            .field("chat_model", &self.chat_model)
            .field("story_model", &self.story_model)
            .field("gemini_api_key", &"[redacted]")
            .field("image_base_url", &self.image_base_url)
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl AppConfig {
    /// Reads configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a
    /// numeric variable does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, treating blank values as unset.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a
    /// numeric variable does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &str| {
            get(name).ok_or_else(|| AppError::Config(format!("{name} environment variable must be set")))
        };

        let port = match get("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| AppError::Config(format!("PORT must be a valid u16: {e}")))?,
            None => 3000,
        };
        let token_ttl_secs = match get("TOKEN_TTL_SECS") {
            Some(raw) => raw.parse().map_err(|e| {
                AppError::Config(format!("TOKEN_TTL_SECS must be a whole number: {e}"))
            })?,
            None => DEFAULT_TOKEN_TTL_SECS,
        };
        if token_ttl_secs <= 0 {
            return Err(AppError::Config("TOKEN_TTL_SECS must be positive".into()));
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port,
            token_secret: required("TOKEN_SECRET")?,
            token_ttl_secs,
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_base_url: get("OPENAI_BASE_URL"),
            chat_model: get("CHAT_MODEL").unwrap_or_else(|| "gpt-4.1-mini".to_owned()),
            story_model: get("STORY_MODEL").unwrap_or_else(|| "gpt-4.1".to_owned()),
            gemini_api_key: required("GEMINI_API_KEY")?,
            image_base_url: get("IMAGE_BASE_URL"),
            public_base_url: get("PUBLIC_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_owned()),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("DATABASE_URL", "postgres://localhost/casefile"),
        ("TOKEN_SECRET", "s3cret"),
        ("OPENAI_API_KEY", "sk-test"),
        ("GEMINI_API_KEY", "g-test"),
    ];

    #[test]
    fn test_from_lookup_applies_defaults() {
        let config = AppConfig::from_lookup(lookup_from(REQUIRED)).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.token_ttl_secs, DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(config.chat_model, "gpt-4.1-mini");
        assert_eq!(config.story_model, "gpt-4.1");
        assert_eq!(config.public_base_url, "http://localhost:3000");
        assert!(config.openai_base_url.is_none());
    }

    #[test]
    fn test_from_lookup_reads_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([("PORT", "8080"), ("TOKEN_TTL_SECS", "60"), ("CHAT_MODEL", "small")]);

        let config = AppConfig::from_lookup(lookup_from(&pairs)).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.token_ttl_secs, 60);
        assert_eq!(config.chat_model, "small");
    }

    #[test]
    fn test_from_lookup_rejects_missing_secret() {
        let pairs: Vec<_> = REQUIRED
            .iter()
            .copied()
            .filter(|(k, _)| *k != "TOKEN_SECRET")
            .collect();

        let result = AppConfig::from_lookup(lookup_from(&pairs));

        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("TOKEN_SECRET")));
    }

    #[test]
    fn test_from_lookup_rejects_bad_port() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "eighty"));

        let result = AppConfig::from_lookup(lookup_from(&pairs));

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AppConfig::from_lookup(lookup_from(REQUIRED)).unwrap();

        let rendered = format!("{config:?}");

        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("sk-test"));
    }
}
