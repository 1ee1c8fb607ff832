//! Casefile API server entry point.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use casefile_api::config::AppConfig;
use casefile_api::error::AppError;
use casefile_api::state::{AppState, Repositories};
use casefile_core::clock::SystemClock;
use casefile_core::rng::SystemRng;
use casefile_identity::domain::password::Passwords;
use casefile_identity::domain::token::TokenSigner;
use casefile_narrative::application::pipeline::PromptPipeline;
use casefile_narrative::clients::imagen::ImagenClient;
use casefile_narrative::clients::openai::{ModelRouting, OpenAiClient};
use casefile_store::PgStore;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Casefile API server");

    let config = AppConfig::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    // Create database connection pool and apply migrations.
    let pool = casefile_store::connect(&config.database_url, 10).await?;
    let store = Arc::new(PgStore::new(pool));

    // Generation backends.
    let mut text = OpenAiClient::new(
        &config.openai_api_key,
        ModelRouting {
            story_model: config.story_model.clone(),
            chat_model: config.chat_model.clone(),
        },
    )?;
    if let Some(url) = &config.openai_base_url {
        text = text.with_base_url(url.clone());
    }
    let mut images = ImagenClient::new(&config.gemini_api_key)?;
    if let Some(url) = &config.image_base_url {
        images = images.with_base_url(url.clone());
    }

    // Build application state.
    let app_state = AppState {
        clock: Arc::new(SystemClock),
        rng: Arc::new(Mutex::new(SystemRng::from_os())),
        repos: Repositories::shared(store),
        pipeline: PromptPipeline::new(Arc::new(text)),
        images: Arc::new(images),
        passwords: Arc::new(Passwords::default()),
        tokens: Arc::new(TokenSigner::new(&config.token_secret, config.token_ttl_secs)),
        public_base_url: config.public_base_url.clone().into(),
    };

    // TODO: Replace CorsLayer::permissive() with the web client's origin once it is deployed.
    let app = casefile_api::app(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server.
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
