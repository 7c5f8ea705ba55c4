//! Diff engine for Quilt.
//!
//! Computes flat, path-indexed diffs between JSON-shaped values: three
//! disjoint lists of added, modified, and deleted dotted paths, each entry
//! describing the minimal divergence point. Diffs can be applied, inverted,
//! merged, and checked for conflicts.
//!
//! Every operation here is pure and total; nothing touches storage.
//!
//! # Key Types
//!
//! - [`Diff`] / [`DiffEntry`] — The flat path-indexed change set
//! - [`generate`] / [`apply`] / [`invert`] — The core algebra
//! - [`find_conflicts`] / [`merge`] — Pairwise diff combination

pub mod diff;
pub mod path;

pub use diff::{apply, find_conflicts, generate, invert, merge, Diff, DiffEntry};
