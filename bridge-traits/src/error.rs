use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Span not found: {key}@{position}")]
    SpanNotFound { key: String, position: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns `true` when the failure means the target was already gone.
    ///
    /// Cache stores report this when a span has been deleted concurrently;
    /// callers treat it as a successful removal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BridgeError::SpanNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
