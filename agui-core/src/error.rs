//! Protocol-level error types.

/// Errors that can occur in the shared protocol machinery.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Payload was not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A patch operation could not be applied to the current state.
    #[error("Invalid patch: {0}")]
    InvalidPatch(String),

    /// A JSON Pointer was malformed.
    #[error("Invalid JSON pointer: {0}")]
    InvalidPointer(String),
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
