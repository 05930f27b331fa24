use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::interview::orchestrator::InterviewError;
use crate::interview::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<InterviewError> for AppError {
    fn from(err: InterviewError) -> Self {
        match err {
            InterviewError::UnknownJob(job) => AppError::Validation(format!("Unknown job: {job}")),
            InterviewError::Store(StoreError::NotFound(id)) => {
                AppError::NotFound(format!("Conversation {id} not found"))
            }
            InterviewError::Store(other) => AppError::Storage(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_interview_errors_map_to_client_codes() {
        let not_found: AppError = InterviewError::Store(StoreError::NotFound(Uuid::nil())).into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let unknown_job: AppError = InterviewError::UnknownJob("x".to_string()).into();
        assert_eq!(unknown_job.into_response().status(), StatusCode::BAD_REQUEST);

        let corrupt: AppError = InterviewError::Store(StoreError::Corrupt("bad".to_string())).into();
        assert_eq!(
            corrupt.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
