//! Error type for store operations.
//!
//! Absence is never an error: `get` on a missing key returns `Ok(None)` and a
//! search over an empty namespace returns `Ok(vec![])`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Caller programming error: unsupported filter operator, non-numeric
    /// comparison operand, unknown match type, or an invalid namespace on write.
    #[error("validation error: {0}")]
    Validation(String),

    /// SQLite failure during open, load, or write-through.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be encoded for persistence.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The embedding provider failed or returned an unexpected shape.
    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// A blocking task panicked or the shared store lock was poisoned.
    #[error("task error: {0}")]
    Task(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
