pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::interview::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/chat/start", post(handlers::handle_start))
        .route("/api/v1/chat/message", post(handlers::handle_message))
        .route("/api/v1/chat/result/:id", get(handlers::handle_get_result))
        .with_state(state)
}
