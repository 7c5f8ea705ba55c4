use quilt_merkle::MerkleError;
use quilt_store::StoreError;
use quilt_types::{ObjectHash, TypeError};
use thiserror::Error;

/// Errors surfaced by engine operations.
///
/// Everything propagates to the caller; the engine retries nothing and never
/// swallows a persistence failure.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An operation was attempted before `init()`.
    #[error("engine is not initialized: call init() first")]
    NotInitialized,

    /// A branch or ref lookup missed.
    #[error("ref not found: {0}")]
    RefNotFound(String),

    /// A branch with this name already exists.
    #[error("ref already exists: {0}")]
    RefExists(String),

    /// `HEAD` does not point under the branch namespace.
    #[error("HEAD does not point at a branch: {0}")]
    DetachedHead(String),

    /// A commit lookup by hash missed.
    #[error("commit not found: {0}")]
    CommitNotFound(ObjectHash),

    /// Time travel to a point before any commit on the branch.
    #[error("no commit on branch '{branch}' at or before {timestamp}")]
    NoAncestorBefore { branch: String, timestamp: u64 },

    /// Attempt to delete `main` or the checked-out branch.
    #[error("cannot delete protected branch: {0}")]
    ProtectedBranch(String),

    /// Terminal operation on a settled merge result.
    #[error("merge result already applied")]
    MergeAlreadyApplied,

    /// `apply()` with outstanding conflicts, or `resolve_with` given no
    /// resolutions while conflicts exist.
    #[error("merge has unresolved conflicts at: {}", .0.join(", "))]
    UnresolvedConflicts(Vec<String>),

    /// Merkle tree failure, including object corruption.
    #[error(transparent)]
    Merkle(#[from] MerkleError),

    /// Underlying storage failure.
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// Hash or canonical-encoding failure.
    #[error(transparent)]
    Types(#[from] TypeError),
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
