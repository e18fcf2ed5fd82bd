use crate::services::{moderation_service::ModerationError, role_service::RoleError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

/// Every moderation outcome the client can act on is a 400 with the message;
/// only unexpected database failures are 500s.
impl From<ModerationError> for AppError {
    fn from(err: ModerationError) -> Self {
        match err {
            ModerationError::Sqlx(e) => {
                tracing::error!("moderation query failed: {}", e);
                AppError::internal("Database error")
            }
            ModerationError::PersistenceFailure { ref source, .. } => {
                tracing::error!("{}: {}", err, source);
                AppError::bad_request(err.to_string())
            }
            other => AppError::bad_request(other.to_string()),
        }
    }
}

impl From<RoleError> for AppError {
    fn from(err: RoleError) -> Self {
        match err {
            RoleError::Sqlx(e) => {
                tracing::error!("role query failed: {}", e);
                AppError::internal("Database error")
            }
            RoleError::AddRolesFailed(ref source) | RoleError::RemoveRolesFailed(ref source) => {
                tracing::warn!("role update failed: {}", source);
                AppError::bad_request(err.to_string())
            }
            other => AppError::bad_request(other.to_string()),
        }
    }
}
