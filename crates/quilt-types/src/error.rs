//! Error types for the foundation layer.

use thiserror::Error;

/// Errors from hash parsing and canonical encoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    /// The input was not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// The decoded hash had the wrong length.
    #[error("invalid hash length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Serialization to canonical JSON failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}
