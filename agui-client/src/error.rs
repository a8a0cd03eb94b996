//! Error types for the AG-UI client.

use thiserror::Error;

use crate::session::SessionError;

/// Errors that can occur when using the AG-UI client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Local validation failed (bad input, missing field); never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Authentication failed (401/403).
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limited by the server (429).
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Server unavailable (502/503/504).
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Permanent HTTP failure (400/404 and friends).
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Transient network failure (refused, reset, timeout, EOF).
    #[error("Network error: {0}")]
    Network(String),

    /// The stream misbehaved at the transport level, e.g. closed without
    /// a terminal event.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Protocol machinery error from the shared core.
    #[error("Protocol error: {0}")]
    Protocol(#[from] agui_core::ProtocolError),

    /// The run itself failed (RUN_ERROR from the producer).
    #[error("Run failed: {message}")]
    RunFailed {
        message: String,
        code: Option<String>,
    },

    /// A local tool invocation failed outright (not a tool-level error
    /// result, which is captured into the tool outcome instead).
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// The operator interrupted the run or a deadline fired.
    #[error("Cancelled")]
    Cancelled,

    /// Client configuration problem.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Session storage error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Whether the transport layer should retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::RateLimited(_)
                | ClientError::ServiceUnavailable(_)
                | ClientError::Network(_)
        )
    }

    /// Whether an HTTP status is worth retrying.
    pub fn is_retryable_status(status: u16) -> bool {
        matches!(status, 429 | 502 | 503 | 504)
    }

    /// Classify an HTTP error status into an error variant.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => ClientError::Authentication(message),
            429 => ClientError::RateLimited(message),
            502 | 503 | 504 => ClientError::ServiceUnavailable(message),
            status => ClientError::Http { status, message },
        }
    }

    /// Classify a reqwest failure into an error variant.
    pub fn from_reqwest_error(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ClientError::Network(format!("Connection failed: {}", err))
        } else if err.is_request() {
            ClientError::Network(format!("Request failed: {}", err))
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
