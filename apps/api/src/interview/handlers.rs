use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::models::{InterviewStatus, Qualifications};
use crate::interview::orchestrator::ConversationStart;
use crate::interview::result::InterviewResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub job_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    pub conversation_id: Uuid,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub response: String,
    pub qualification_status: Option<Qualifications>,
    pub conversation_complete: bool,
    pub status: InterviewStatus,
    pub is_follow_up: bool,
}

/// POST /api/v1/chat/start
pub async fn handle_start(
    State(state): State<AppState>,
    body: Option<Json<StartRequest>>,
) -> Result<Json<ConversationStart>, AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let job_id = req.job_id.as_deref().map(str::trim).filter(|j| !j.is_empty());
    let start = state.orchestrator.start_conversation(job_id).await?;
    Ok(Json(start))
}

/// POST /api/v1/chat/message
pub async fn handle_message(
    State(state): State<AppState>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(AppError::Validation("message must not be empty".to_string()));
    }

    let turn = state
        .orchestrator
        .process_turn(req.conversation_id, message)
        .await?;

    Ok(Json(MessageResponse {
        response: turn.agent_response,
        qualification_status: turn.qualification_update,
        conversation_complete: turn.conversation_complete,
        status: turn.status,
        is_follow_up: turn.is_follow_up,
    }))
}

/// GET /api/v1/chat/result/:id
pub async fn handle_get_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InterviewResult>, AppError> {
    let result = state.orchestrator.get_result(id).await?;
    Ok(Json(result))
}
