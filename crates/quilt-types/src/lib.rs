//! Foundation types for Quilt.
//!
//! This crate provides the content-hash, canonical-encoding, and commit-record
//! types used throughout the Quilt engine. Every other Quilt crate depends on
//! `quilt-types`.
//!
//! # Key Types
//!
//! - [`ObjectHash`] — Content-addressed identifier (SHA-256 over canonical JSON)
//! - [`Commit`] — Immutable commit record binding a snapshot to a branch history
//! - [`canonical_bytes`] / [`hash_value`] — The canonical JSON encoding rule

pub mod canon;
pub mod commit;
pub mod error;
pub mod hash;

pub use canon::{canonical_bytes, hash_value};
pub use commit::Commit;
pub use error::TypeError;
pub use hash::ObjectHash;
