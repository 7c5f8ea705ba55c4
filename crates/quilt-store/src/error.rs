//! Error types for storage operations.

use thiserror::Error;

/// Errors from backend and facade operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying KV store failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// Serialization or deserialization failure inside a backend.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The branch name is invalid.
    #[error("invalid branch name: {name}: {reason}")]
    InvalidBranchName { name: String, reason: String },

    /// I/O error from a file-based backend.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;
