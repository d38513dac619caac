mod analysis;
mod cache;
mod config;
mod errors;
mod llm_client;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::handlers::ADMIN_TOKEN_HEADER;
use crate::analysis::{AnalysisOrchestrator, Pricing, RetryPolicy};
use crate::cache::build_cache_store;
use crate::config::Config;
use crate::llm_client::{GenerativeBackend, OpenAiClient};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume analyzer v{}", env!("CARGO_PKG_VERSION"));

    // One store for the whole process, handed to every request through AppState
    let cache = build_cache_store(&config)?;

    let backend = OpenAiClient::new(
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        &config.openai_base_url,
    )?;
    info!("Generative backend initialized (model: {})", backend.model());

    let orchestrator = AnalysisOrchestrator::new(cache.clone(), Arc::new(backend))
        .with_retry(RetryPolicy {
            max_attempts: config.backend_max_attempts,
            ..RetryPolicy::default()
        })
        .with_pricing(Pricing {
            per_input_token: config.cost_per_input_token,
            per_output_token: config.cost_per_output_token,
        })
        .with_attempt_timeout(Duration::from_secs(config.backend_timeout_secs))
        .with_cache_ttl(Duration::from_secs(config.cache_ttl_secs));

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        cache,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.allowed_origins)?);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .with_context(|| format!("ALLOWED_ORIGINS entry '{o}' is not a valid origin"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(ADMIN_TOKEN_HEADER),
        ])
        .allow_credentials(true))
}
