//! Error types for reelpress-server
//!
//! One variant per failure class of the export pipeline; each maps to a
//! fixed HTTP status and machine-readable code.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::ProcessError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed input: bad URL, missing field, quota exceeded (400)
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Unknown session (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// External tool could not be started, exited non-zero, or timed out (500)
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// External tool reported success but its output is missing (500)
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// Artifact could not be opened for streaming (500)
    #[error("Stream error: {0}")]
    Stream(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Unreadable JSON bodies answer in the same envelope as every other error
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Process(ProcessError::Spawn { .. }) => "SPAWN_ERROR",
            ApiError::Process(_) => "PROCESS_ERROR",
            ApiError::Consistency(_) => "CONSISTENCY_ERROR",
            ApiError::Stream(_) => "STREAM_ERROR",
            ApiError::Io(_) => "IO_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "Request rejected");
        }

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers and pipeline services
pub type ApiResult<T> = Result<T, ApiError>;
