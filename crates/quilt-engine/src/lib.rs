//! Version control engine for Quilt.
//!
//! Ties the Merkle, diff, and storage layers into a Git-like engine over
//! JSON-shaped values: named branches with linear commit histories, a `HEAD`
//! pointer, point-in-time retrieval, and three-way merge with explicit
//! conflict surfacing.
//!
//! # Key Types
//!
//! - [`Engine`] — Long-lived handle bound to one database
//! - [`MergeResult`] — A computed merge awaiting `apply`/`resolve_with`/`abort`
//! - [`Conflict`] — One conflicting path with its ancestor/source/target values
//!
//! The pure diff helpers are re-exported as [`diff`] and [`apply_diff`].

pub mod engine;
pub mod error;
pub mod merge;

pub use engine::{Engine, DEFAULT_BRANCH};
pub use error::{EngineError, EngineResult};
pub use merge::{Conflict, MergeResult};

pub use quilt_diff::{apply as apply_diff, generate as diff, Diff, DiffEntry};
pub use quilt_types::{Commit, ObjectHash};
