use std::sync::Arc;

use crate::config::Config;
use crate::interview::orchestrator::ConversationOrchestrator;
use crate::llm_client::metrics::ModelMetrics;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ConversationOrchestrator>,
    /// Same instance the backend router records into.
    pub metrics: Arc<ModelMetrics>,
    pub config: Config,
}
