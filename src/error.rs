use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Room not found")]
    RoomNotFound,

    #[error("Room is full")]
    RoomFull,

    #[error("Already joined a room")]
    AlreadyJoined,

    #[error("Join a room before signaling")]
    NotJoined,

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Room code generation failed after retries")]
    CodeGenerationFailed,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::RoomNotFound => (StatusCode::NOT_FOUND, "Room not found".to_string()),
            AppError::RoomFull => (StatusCode::CONFLICT, "Room is full".to_string()),
            AppError::AlreadyJoined => (StatusCode::BAD_REQUEST, "Already joined a room".to_string()),
            AppError::NotJoined => (StatusCode::BAD_REQUEST, "Join a room before signaling".to_string()),
            AppError::MalformedFrame(msg) => (StatusCode::BAD_REQUEST, format!("Malformed frame: {}", msg)),
            AppError::CodeGenerationFailed => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Room code generation failed".to_string())
            }
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, format!("Configuration error: {}", msg)),
        };

        let body = Json(json!({
            "error": error_message,
            "code": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
