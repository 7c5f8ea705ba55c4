use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::{self, ROOT};

/// A value carried at a path by a diff.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub path: String,
    pub value: Value,
}

/// A flat, path-indexed diff between two values.
///
/// The three lists are disjoint in path; each entry describes the minimal
/// divergence point, not every ancestor. The root is `"."` when the entire
/// value is added, deleted, or replaced.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    /// Paths newly present, with their values.
    pub added: Vec<DiffEntry>,
    /// Paths present in both sides whose values differ, with the new values.
    pub modified: Vec<DiffEntry>,
    /// Paths previously present, now absent.
    pub deleted: Vec<String>,
}

impl Diff {
    /// Create an empty diff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if there are no changes.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Total number of changes.
    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }

    /// Paths written by this diff (added or modified).
    fn written_paths(&self) -> BTreeSet<&str> {
        self.added
            .iter()
            .chain(&self.modified)
            .map(|e| e.path.as_str())
            .collect()
    }

    /// All paths this diff touches.
    fn touched_paths(&self) -> BTreeSet<&str> {
        let mut paths = self.written_paths();
        paths.extend(self.deleted.iter().map(String::as_str));
        paths
    }
}

/// Compute the diff from `old` to `new`.
///
/// `None` models an absent side: both absent is a no-op, one absent emits a
/// whole-side add or delete at the anchor path. A type mismatch (primitive
/// vs. composite, or array vs. object) is a single modification at that path
/// with no descent. Same-kind composites recurse on their key sets; array
/// elements are keyed by stringified index.
pub fn generate(old: Option<&Value>, new: Option<&Value>) -> Diff {
    let mut out = Diff::new();
    generate_at(ROOT, old, new, &mut out);
    out
}

fn generate_at(at: &str, old: Option<&Value>, new: Option<&Value>, out: &mut Diff) {
    match (old, new) {
        (None, None) => {}
        (None, Some(new_value)) => out.added.push(DiffEntry {
            path: at.to_string(),
            value: new_value.clone(),
        }),
        (Some(_), None) => out.deleted.push(at.to_string()),
        (Some(old_value), Some(new_value)) => match (old_value, new_value) {
            (Value::Object(old_map), Value::Object(new_map)) => {
                for (key, old_child) in old_map {
                    generate_at(
                        &path::join(at, key),
                        Some(old_child),
                        new_map.get(key),
                        out,
                    );
                }
                for (key, new_child) in new_map {
                    if !old_map.contains_key(key) {
                        generate_at(&path::join(at, key), None, Some(new_child), out);
                    }
                }
            }
            (Value::Array(old_items), Value::Array(new_items)) => {
                // Positional comparison; element identity is not tracked.
                let len = old_items.len().max(new_items.len());
                for i in 0..len {
                    generate_at(
                        &path::join(at, &i.to_string()),
                        old_items.get(i),
                        new_items.get(i),
                        out,
                    );
                }
            }
            _ => {
                if old_value != new_value {
                    out.modified.push(DiffEntry {
                        path: at.to_string(),
                        value: new_value.clone(),
                    });
                }
            }
        },
    }
}

/// Apply a diff to a value, producing the patched copy.
///
/// Deletions are unset first, then modifications, then additions. Deletions
/// run deepest-and-highest-index first so that removing array elements does
/// not shift the indices of later removals.
pub fn apply(value: &Value, diff: &Diff) -> Value {
    let mut result = value.clone();
    let mut deleted = diff.deleted.clone();
    deleted.sort_by(|a, b| path::compare(b, a));
    for path in &deleted {
        path::unset_path(&mut result, path);
    }
    for entry in &diff.modified {
        path::set_path(&mut result, &entry.path, entry.value.clone());
    }
    for entry in &diff.added {
        path::set_path(&mut result, &entry.path, entry.value.clone());
    }
    result
}

/// Invert a diff with respect to its pre-image.
///
/// The result undoes the diff: `apply(apply(v, d), invert(v, d)) == v` for
/// any diff generated from `v`. Added paths become deletions; deleted and
/// modified paths are restored from the pre-image.
pub fn invert(pre: &Value, diff: &Diff) -> Diff {
    let mut out = Diff::new();
    for entry in &diff.added {
        out.deleted.push(entry.path.clone());
    }
    for path in &diff.deleted {
        if let Some(value) = path::get_path(pre, path) {
            out.added.push(DiffEntry {
                path: path.clone(),
                value: value.clone(),
            });
        }
    }
    for entry in &diff.modified {
        if let Some(value) = path::get_path(pre, &entry.path) {
            out.modified.push(DiffEntry {
                path: entry.path.clone(),
                value: value.clone(),
            });
        }
    }
    out
}

/// Find the paths where two diffs conflict.
///
/// Two diffs conflict at a path when both write it (value-blind: writes of
/// equal values still count, so callers may choose to collapse them), when
/// one deletes it and the other writes it, or when one side touches a strict
/// ancestor of a path the other touches (replacing `user` wholesale
/// conflicts with editing `user.name`). Ancestor conflicts report the
/// ancestor path. The result is sorted and deduplicated.
pub fn find_conflicts(a: &Diff, b: &Diff) -> Vec<String> {
    let a_written = a.written_paths();
    let b_written = b.written_paths();
    let a_touched = a.touched_paths();
    let b_touched = b.touched_paths();

    let mut conflicts: BTreeSet<String> = BTreeSet::new();

    for p in &a_written {
        if b_written.contains(p) {
            conflicts.insert((*p).to_string());
        }
    }
    for p in a.deleted.iter().map(String::as_str) {
        if b_written.contains(p) {
            conflicts.insert(p.to_string());
        }
    }
    for p in b.deleted.iter().map(String::as_str) {
        if a_written.contains(p) {
            conflicts.insert(p.to_string());
        }
    }
    for p in &a_touched {
        for q in &b_touched {
            if path::is_ancestor(p, q) {
                conflicts.insert((*p).to_string());
            } else if path::is_ancestor(q, p) {
                conflicts.insert((*q).to_string());
            }
        }
    }

    conflicts.into_iter().collect()
}

/// Union of two diffs, with the second argument winning wherever the two
/// overlap (equal paths or ancestor/descendant pairs).
///
/// Administrative helper; three-way merge does not use it.
pub fn merge(a: &Diff, b: &Diff) -> Diff {
    let b_touched = b.touched_paths();
    let overlaps = |path: &str| {
        b_touched.iter().any(|q| {
            path == *q || path::is_ancestor(path, q) || path::is_ancestor(q, path)
        })
    };

    let mut out = Diff::new();
    out.added
        .extend(a.added.iter().filter(|e| !overlaps(&e.path)).cloned());
    out.modified
        .extend(a.modified.iter().filter(|e| !overlaps(&e.path)).cloned());
    out.deleted
        .extend(a.deleted.iter().filter(|p| !overlaps(p)).cloned());

    out.added.extend(b.added.iter().cloned());
    out.modified.extend(b.modified.iter().cloned());
    out.deleted.extend(b.deleted.iter().cloned());
    out
}
