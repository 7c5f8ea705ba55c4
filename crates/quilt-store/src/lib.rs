//! Storage layer for Quilt.
//!
//! The engine persists three logical namespaces per database: `objects`
//! (Merkle nodes keyed by hash), `refs` (named pointers, including `HEAD`),
//! and `commits` (commit records with a branch/timestamp index). This crate
//! defines the [`Backend`] contract an embedded KV store must satisfy, an
//! in-memory implementation for tests and embedding, and the typed [`Store`]
//! facade the engine talks to.

pub mod error;
pub mod memory;
pub mod refs;
pub mod store;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryBackend;
pub use refs::{branch_name, branch_ref, validate_branch_name, BRANCH_PREFIX, HEAD_REF};
pub use store::Store;
pub use traits::Backend;
