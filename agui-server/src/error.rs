//! Error types for the AG-UI server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Errors that can occur when building a router.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// An empty nesting prefix was supplied.
    #[error("Nesting prefix must not be empty")]
    EmptyPrefix,
}

/// Errors that can occur while serving AG-UI requests.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Invalid request from the client.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unsupported shared-state mutation operation.
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::InvalidRequest(e) => (StatusCode::BAD_REQUEST, e.clone()),
            ServerError::UnknownOperation(e) => (StatusCode::BAD_REQUEST, e.clone()),
            ServerError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.clone()),
        };

        let body = Json(serde_json::json!({
            "error": message,
            "code": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
