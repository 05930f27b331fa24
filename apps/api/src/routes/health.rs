use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Service status plus the model-chain metrics snapshot.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "screener",
        "fallbackEnabled": state.config.enable_fallback,
        "models": state.metrics.snapshot(),
    }))
}
