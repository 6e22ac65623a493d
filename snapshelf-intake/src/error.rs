//! Error types for snapshelf-intake
//!
//! `SessionError` is what session operations return; `ApiError` maps it
//! (and the other failures a handler can hit) onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::CatalogError;

/// Session operation errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// Malformed caller input (missing id, empty ordering)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Precondition not met (no selection, empty queue)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Path escapes the watched folder or cannot be resolved
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Referenced queue entry absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote catalog or network failure
    #[error("Upstream failure: {0}")]
    Upstream(#[from] CatalogError),

    /// Local disk failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Stable machine-readable code for the front door
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::InvalidRequest(_) => "INVALID_REQUEST",
            SessionError::InvalidState(_) => "INVALID_STATE",
            SessionError::InvalidPath(_) => "INVALID_PATH",
            SessionError::NotFound(_) => "NOT_FOUND",
            SessionError::Upstream(_) => "UPSTREAM_FAILURE",
            SessionError::Io(_) => "IO_FAILURE",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SessionError::InvalidRequest(_) | SessionError::InvalidPath(_) => {
                StatusCode::BAD_REQUEST
            }
            SessionError::InvalidState(_) => StatusCode::CONFLICT,
            SessionError::NotFound(_) => StatusCode::NOT_FOUND,
            SessionError::Upstream(_) => StatusCode::BAD_GATEWAY,
            SessionError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request body or query could not be parsed (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Handler-side failure such as a panicked background task (500)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST", msg),
            ApiError::Session(ref err) => (err.status(), err.code(), err.to_string()),
            ApiError::Catalog(ref err) => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_FAILURE", err.to_string())
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            tracing::error!(code = error_code, "{}", message);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
