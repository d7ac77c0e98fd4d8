//! Error types for the session store.

use crisou_engine::EngineError;

/// Errors that can occur while reading or writing sessions.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record was written where one already exists.
    #[error("Key already exists: {0}")]
    AlreadyExists(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        Self::Persistence(err.to_string())
    }
}
