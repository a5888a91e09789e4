use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fitcheck::config::Config;
use fitcheck::llm_client::{LanguageModel, LlmClient};
use fitcheck::routes::build_router;
use fitcheck::session::{Session, SessionSettings};
use fitcheck::similarity::{create_embedder, Embedder};
use fitcheck::state::AppState;

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

    info!("Starting fitcheck v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm: Arc<dyn LanguageModel> =
        Arc::new(LlmClient::new(config.llm.clone()).context("Failed to build LLM client")?);
    info!(
        "LLM client initialized (model: {}, base URL: {})",
        llm.model_name(),
        config.llm.base_url
    );

    // Initialize embedding backend
    let embedder: Arc<dyn Embedder> = Arc::from(
        create_embedder(&config.embedding).context("Failed to initialize embedding backend")?,
    );
    info!(
        "Embedding backend initialized ({:?}, model: {})",
        config.embedding.provider,
        embedder.model_name()
    );

    // One evaluation session per process
    let session = Session::new(llm, embedder, &SessionSettings::from(&config));

    let state = AppState {
        session: Arc::new(session),
        retry: config.retry,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::new(config.bind_addr, config.port);
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
