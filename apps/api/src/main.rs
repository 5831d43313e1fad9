mod assistant;
mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod persistence;
mod routes;
mod state;

#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::assistant::render::{
    FormatterKind, LlmSectionFormatter, PlainSectionFormatter, SectionFormatter,
};
use crate::assistant::service::{AssistantSettings, ResumeAssistant};
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::{Completion, LlmClient};
use crate::persistence::blob::S3BlobStore;
use crate::persistence::postgres::PgResumeRepository;
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

    info!("Starting CV Builder API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs pending migrations)
    let db = create_pool(&config.database_url).await?;
    let repo = Arc::new(PgResumeRepository::new(db));

    // Initialize S3 / MinIO
    let blobs = Arc::new(S3BlobStore::from_config(&config).await);
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Initialize LLM client
    let llm: Arc<dyn Completion> = Arc::new(LlmClient::new(
        config.anthropic_api_key.clone(),
        config.llm_timeout,
    )?);
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let formatter: Arc<dyn SectionFormatter> = match config.section_formatter {
        FormatterKind::Llm => Arc::new(LlmSectionFormatter::new(llm.clone())),
        FormatterKind::Plain => Arc::new(PlainSectionFormatter),
    };
    info!("Section formatter: {}", config.section_formatter);

    let assistant = ResumeAssistant::new(
        llm,
        formatter,
        repo,
        blobs,
        AssistantSettings {
            layout: config.section_layout.clone(),
            extraction_timeout: config.extraction_timeout,
        },
    );

    // Build app state
    let state = AppState {
        assistant: Arc::new(assistant),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .layer(TimeoutLayer::new(config.request_timeout)),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
