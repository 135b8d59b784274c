//! Interview Coach - LLM-simulated job interviews
//!
//! A Rust backend driving a five-answer interview state machine against an
//! `OpenAI`-compatible completion API, followed by a scored evaluation.

mod api;
mod interview;
mod llm;
mod runtime;

use api::{create_router, AppState};
use llm::{CompletionClient, LlmConfig, LoggingService, OpenAiCompatService};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "interview_coach=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let port: u16 = std::env::var("INTERVIEW_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);
    let session_ttl = std::env::var("INTERVIEW_SESSION_TTL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|secs: &u64| *secs > 0)
        .map_or(Duration::from_secs(3600), Duration::from_secs);

    // Initialize completion client
    let llm_config = LlmConfig::from_env();
    let client: Option<Arc<dyn CompletionClient>> = match OpenAiCompatService::new(&llm_config) {
        Ok(service) => {
            tracing::info!(
                model = %llm_config.model,
                url = %llm_config.completions_url(),
                timeout_secs = llm_config.request_timeout.as_secs(),
                "Completion client initialized"
            );
            Some(Arc::new(LoggingService::new(Arc::new(service))))
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "No completion client available. Set GEMINI_API_KEY to enable interviewer replies and feedback."
            );
            None
        }
    };

    // Create application state
    let state = AppState::new(client, llm_config.request_timeout);
    state.sessions.spawn_idle_sweeper(session_ttl);
    tracing::info!(ttl_secs = session_ttl.as_secs(), "Idle session sweep started");

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new().gzip(true).br(true);

    let app = create_router(state).layer(cors).layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Interview coach listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
