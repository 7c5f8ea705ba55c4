//! Error types for Merkle tree operations.

use quilt_store::StoreError;
use quilt_types::ObjectHash;
use thiserror::Error;

/// Errors from building, storing, or loading Merkle trees.
#[derive(Debug, Error)]
pub enum MerkleError {
    /// A referenced node is absent or cannot be decoded. This is data
    /// corruption and is never silently skipped.
    #[error("corrupt object {hash}: {reason}")]
    CorruptObject { hash: ObjectHash, reason: String },

    /// Serialization of a node to its canonical form failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for Merkle operations.
pub type MerkleResult<T> = Result<T, MerkleError>;
