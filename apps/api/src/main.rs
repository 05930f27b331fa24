mod config;
mod db;
mod errors;
mod interview;
mod llm_client;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::interview::job::JobCatalog;
use crate::interview::orchestrator::ConversationOrchestrator;
use crate::interview::prompt_builder::{PromptAssets, PromptBuilder};
use crate::interview::store::{
    ConversationStateStore, InMemoryConversationStore, PgConversationStore,
};
use crate::llm_client::backends::default_backends;
use crate::llm_client::metrics::ModelMetrics;
use crate::llm_client::retry::RetryConfig;
use crate::llm_client::router::BackendRouter;
use crate::llm_client::GeminiClient;
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

    info!("Starting screener v{}", env!("CARGO_PKG_VERSION"));

    // Interview record storage
    let store: Arc<dyn ConversationStateStore> = match &config.database_url {
        Some(url) => Arc::new(PgConversationStore::new(create_pool(url).await?)),
        None => {
            warn!("DATABASE_URL not set, interviews are kept in memory only");
            Arc::new(InMemoryConversationStore::new())
        }
    };

    // Model chain
    let metrics = Arc::new(ModelMetrics::new());
    let client = Arc::new(GeminiClient::new(config.gemini_api_key.clone())?);
    let router = BackendRouter::new(client, default_backends(), metrics.clone())
        .with_retry(RetryConfig::default())
        .with_fallback(config.enable_fallback);
    info!(
        "Model chain: {} (fallback {})",
        router.backend_names().join(" -> "),
        if config.enable_fallback { "on" } else { "off" }
    );

    // Prompt assets and job profiles
    let assets = PromptAssets::load(&config.prompts_dir);
    let jobs = JobCatalog::default();
    if jobs.get(&config.default_job_id).is_none() {
        anyhow::bail!("DEFAULT_JOB_ID '{}' is not a known job", config.default_job_id);
    }

    let orchestrator = ConversationOrchestrator::new(
        store,
        Arc::new(router),
        PromptBuilder::new(assets),
        jobs,
    )
    .with_default_job(config.default_job_id.clone());

    // Build app state
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        metrics,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the candidate chat front-end

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
