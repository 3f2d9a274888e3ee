use crate::event::ValidationError;
use thiserror::Error;

/// Errors raised by the entity state store
#[derive(Debug, Error)]
pub enum EngineError {
    /// Event failed validation; no state was changed
    #[error("invalid telemetry for '{entity_id}': {source}")]
    InvalidTelemetry {
        entity_id: String,
        #[source]
        source: ValidationError,
    },
}

/// Errors raised by session control operations
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("invalid fence: {0}")]
    InvalidFence(String),
}
