use thiserror::Error;

/// Errors that can occur in the outbox dispatcher.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An expander could not derive child events from a parent payload.
    #[error("expansion failed for event type '{event_type}': {reason}")]
    ExpansionFailed { event_type: String, reason: String },

    /// A stored row contained a value outside the closed code sets.
    #[error("invalid stored value: {0}")]
    InvalidStored(String),
}

/// Result type for outbox operations.
pub type Result<T> = std::result::Result<T, OutboxError>;
