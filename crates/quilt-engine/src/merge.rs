use std::collections::{BTreeMap, HashSet};

use serde_json::Value;
use tracing::debug;

use quilt_diff::path::{get_path, is_ancestor, set_path};
use quilt_diff::{find_conflicts, generate, Diff};
use quilt_types::{Commit, ObjectHash};

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};

/// One conflicting path in a three-way merge, with the value each side holds
/// there. Any of the three may be absent (e.g. a path added on only one
/// side).
#[derive(Clone, Debug, PartialEq)]
pub struct Conflict {
    pub path: String,
    pub ancestor: Option<Value>,
    pub source: Option<Value>,
    pub target: Option<Value>,
}

/// A computed three-way merge awaiting its terminal operation.
///
/// Single-use: exactly one of [`MergeResult::apply`],
/// [`MergeResult::resolve_with`], or [`MergeResult::abort`] may run, after
/// which every terminal operation fails. Nothing is persisted until `apply`
/// or `resolve_with` commits.
#[derive(Debug)]
pub struct MergeResult {
    source_branch: String,
    target_branch: String,
    ancestor: ObjectHash,
    source_head: ObjectHash,
    target_head: ObjectHash,
    merged: Value,
    conflicts: Vec<Conflict>,
    applied: bool,
}

impl MergeResult {
    /// The branch being merged from.
    pub fn source_branch(&self) -> &str {
        &self.source_branch
    }

    /// The branch being merged into.
    pub fn target_branch(&self) -> &str {
        &self.target_branch
    }

    /// The common-ancestor commit the merge was based on.
    pub fn ancestor(&self) -> ObjectHash {
        self.ancestor
    }

    /// The source branch head at merge time.
    pub fn source_head(&self) -> ObjectHash {
        self.source_head
    }

    /// The target branch head at merge time.
    pub fn target_head(&self) -> ObjectHash {
        self.target_head
    }

    /// The auto-merged value (conflicting paths keep the target's state).
    pub fn merged(&self) -> &Value {
        &self.merged
    }

    /// The outstanding conflicts.
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// Returns `true` if any conflicts are outstanding.
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Returns `true` once a terminal operation has run.
    pub fn is_applied(&self) -> bool {
        self.applied
    }

    /// Commit the merged value onto the target branch.
    ///
    /// Fails with [`EngineError::UnresolvedConflicts`] while conflicts are
    /// outstanding.
    pub fn apply(&mut self, engine: &Engine, message: Option<&str>) -> EngineResult<Commit> {
        self.ensure_open()?;
        if !self.conflicts.is_empty() {
            return Err(EngineError::UnresolvedConflicts(self.conflict_paths()));
        }
        self.commit_merged(engine, message)
    }

    /// Resolve conflicts with caller-chosen values, then commit.
    ///
    /// Each resolution sets its path on the merged value; a resolution for a
    /// path that was never a conflict is accepted and overwrites the merged
    /// value there. With conflicts outstanding and no resolutions given, the
    /// merge fails instead of committing.
    pub fn resolve_with(
        &mut self,
        engine: &Engine,
        resolutions: Option<&BTreeMap<String, Value>>,
        message: Option<&str>,
    ) -> EngineResult<Commit> {
        self.ensure_open()?;
        match resolutions {
            None => {
                if !self.conflicts.is_empty() {
                    return Err(EngineError::UnresolvedConflicts(self.conflict_paths()));
                }
            }
            Some(resolutions) => {
                for (path, value) in resolutions {
                    set_path(&mut self.merged, path, value.clone());
                }
            }
        }
        self.commit_merged(engine, message)
    }

    /// Abandon the merge. No persistent effect; the handle is spent.
    pub fn abort(&mut self) -> EngineResult<()> {
        self.ensure_open()?;
        self.applied = true;
        Ok(())
    }

    fn ensure_open(&self) -> EngineResult<()> {
        if self.applied {
            Err(EngineError::MergeAlreadyApplied)
        } else {
            Ok(())
        }
    }

    fn conflict_paths(&self) -> Vec<String> {
        self.conflicts.iter().map(|c| c.path.clone()).collect()
    }

    fn commit_merged(&mut self, engine: &Engine, message: Option<&str>) -> EngineResult<Commit> {
        let default = format!(
            "Merge branch '{}' into {}",
            self.source_branch, self.target_branch
        );
        let commit = engine.commit(
            Some(self.target_branch.as_str()),
            &self.merged,
            Some(message.unwrap_or(&default)),
        )?;
        self.applied = true;
        Ok(commit)
    }
}

impl Engine {
    /// Three-way merge of `source` into `target` (default: the current
    /// branch).
    ///
    /// Computes the common ancestor, diffs both heads against it, surfaces
    /// conflicting paths, and auto-merges the rest of the source's changes
    /// onto the target's data. Nothing is committed; the returned
    /// [`MergeResult`] carries the outcome.
    pub fn merge(&self, source: &str, target: Option<&str>) -> EngineResult<MergeResult> {
        self.ensure_initialized()?;
        let target = self.resolve_branch(target)?;
        let source_head = self.head_commit(source)?;
        let target_head = self.head_commit(&target)?;

        if source == target || source_head.hash == target_head.hash {
            let merged = self.data_at_commit(&target_head.hash)?;
            return Ok(MergeResult {
                source_branch: source.to_string(),
                target_branch: target,
                ancestor: target_head.hash,
                source_head: source_head.hash,
                target_head: target_head.hash,
                merged,
                conflicts: Vec::new(),
                applied: false,
            });
        }

        let ancestor = self.common_ancestor(&source_head, &target_head)?;
        let ancestor_data = self.data_at_commit(&ancestor.hash)?;
        let source_data = self.data_at_commit(&source_head.hash)?;
        let target_data = self.data_at_commit(&target_head.hash)?;

        let source_diff = generate(Some(&ancestor_data), Some(&source_data));
        let target_diff = generate(Some(&ancestor_data), Some(&target_data));
        let conflict_paths = find_conflicts(&source_diff, &target_diff);

        let cleaned = strip_conflicting(&source_diff, &conflict_paths);
        let merged = quilt_diff::apply(&target_data, &cleaned);

        let conflicts = conflict_paths
            .into_iter()
            .map(|path| Conflict {
                ancestor: get_path(&ancestor_data, &path).cloned(),
                source: get_path(&source_data, &path).cloned(),
                target: get_path(&target_data, &path).cloned(),
                path,
            })
            .collect::<Vec<_>>();

        debug!(
            source = %source,
            target = %target,
            ancestor = %ancestor.hash.short_hex(),
            conflicts = conflicts.len(),
            "computed three-way merge"
        );

        Ok(MergeResult {
            source_branch: source.to_string(),
            target_branch: target,
            ancestor: ancestor.hash,
            source_head: source_head.hash,
            target_head: target_head.hash,
            merged,
            conflicts,
            applied: false,
        })
    }

    /// Lowest common ancestor of two heads.
    ///
    /// Walks parent pointers from both heads; the target-side chain is
    /// scanned head-to-root and the first commit also reachable from the
    /// source head wins. Histories are linear per branch, so that is the
    /// newest shared commit. Histories that share nothing fall back to the
    /// root commit of the branch whose history starts earlier.
    fn common_ancestor(&self, source: &Commit, target: &Commit) -> EngineResult<Commit> {
        let source_chain = self.ancestor_chain(source)?;
        let target_chain = self.ancestor_chain(target)?;
        let source_hashes: HashSet<ObjectHash> =
            source_chain.iter().map(|c| c.hash).collect();

        if let Some(shared) = target_chain
            .iter()
            .find(|c| source_hashes.contains(&c.hash))
        {
            return Ok(shared.clone());
        }

        let source_root = source_chain.last().expect("chain contains its head");
        let target_root = target_chain.last().expect("chain contains its head");
        if source_root.timestamp <= target_root.timestamp {
            Ok(source_root.clone())
        } else {
            Ok(target_root.clone())
        }
    }

    /// The commit chain from `head` back to its root, via parent pointers.
    fn ancestor_chain(&self, head: &Commit) -> EngineResult<Vec<Commit>> {
        let mut chain = vec![head.clone()];
        let mut current = head.clone();
        while let Some(parent) = current.parent {
            current = self
                .store()
                .get_commit(&parent)?
                .ok_or(EngineError::CommitNotFound(parent))?;
            chain.push(current.clone());
        }
        Ok(chain)
    }
}

/// Drop every entry whose path equals, descends from, or contains a
/// conflicting path. What remains is safe to replay onto the target.
fn strip_conflicting(diff: &Diff, conflicts: &[String]) -> Diff {
    let blocked = |path: &str| {
        conflicts
            .iter()
            .any(|c| path == c || is_ancestor(c, path) || is_ancestor(path, c))
    };
    Diff {
        added: diff
            .added
            .iter()
            .filter(|e| !blocked(&e.path))
            .cloned()
            .collect(),
        modified: diff
            .modified
            .iter()
            .filter(|e| !blocked(&e.path))
            .cloned()
            .collect(),
        deleted: diff
            .deleted
            .iter()
            .filter(|p| !blocked(p))
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quilt_store::MemoryBackend;
    use serde_json::json;

    fn engine() -> Engine {
        let engine = Engine::new("merge-tests", Box::new(MemoryBackend::new()));
        engine.init().unwrap();
        engine
    }

    fn resolutions(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Degenerate merges (P6)
    // -----------------------------------------------------------------------

    #[test]
    fn merging_a_branch_into_itself_is_clean() {
        let engine = engine();
        engine.commit(None, &json!({"v": 1}), None).unwrap();
        let result = engine.merge("main", Some("main")).unwrap();
        assert!(!result.has_conflicts());
        assert_eq!(result.merged(), &json!({"v": 1}));
    }

    #[test]
    fn merging_equal_heads_is_clean() {
        let engine = engine();
        engine.commit(None, &json!({"v": 1}), None).unwrap();
        engine.create_branch("twin", None).unwrap();
        let result = engine.merge("twin", Some("main")).unwrap();
        assert!(!result.has_conflicts());
        assert_eq!(result.merged(), &json!({"v": 1}));
    }

    // -----------------------------------------------------------------------
    // Fast-forward (P7)
    // -----------------------------------------------------------------------

    #[test]
    fn fast_forward_merge_takes_source_data() {
        let engine = engine();
        engine.commit(None, &json!({"base": 1}), None).unwrap();
        engine.create_branch("feature", None).unwrap();
        engine
            .commit(Some("feature"), &json!({"base": 1, "extra": 2}), None)
            .unwrap();

        let mut result = engine.merge("feature", Some("main")).unwrap();
        assert!(!result.has_conflicts());
        assert_eq!(result.merged(), &json!({"base": 1, "extra": 2}));

        result.apply(&engine, None).unwrap();
        assert_eq!(engine.branch_data("main").unwrap(), json!({"base": 1, "extra": 2}));
    }

    // -----------------------------------------------------------------------
    // Auto-merge of disjoint edits
    // -----------------------------------------------------------------------

    #[test]
    fn disjoint_edits_merge_automatically() {
        let engine = engine();
        engine
            .commit(None, &json!({"a": 1, "b": 2}), Some("base"))
            .unwrap();
        engine.create_branch("feature", None).unwrap();
        engine
            .commit(Some("feature"), &json!({"a": 9, "b": 2}), None)
            .unwrap();
        engine
            .commit(Some("main"), &json!({"a": 1, "b": 9}), None)
            .unwrap();

        let mut result = engine.merge("feature", Some("main")).unwrap();
        assert!(!result.has_conflicts());
        assert_eq!(result.merged(), &json!({"a": 9, "b": 9}));

        let commit = result.apply(&engine, None).unwrap();
        assert_eq!(commit.message, "Merge branch 'feature' into main");
        assert_eq!(engine.branch_data("main").unwrap(), json!({"a": 9, "b": 9}));
    }

    #[test]
    fn additions_and_deletions_merge_automatically() {
        let engine = engine();
        engine
            .commit(None, &json!({"keep": 1, "drop": 2}), None)
            .unwrap();
        engine.create_branch("feature", None).unwrap();
        engine
            .commit(Some("feature"), &json!({"keep": 1, "drop": 2, "fresh": 3}), None)
            .unwrap();
        engine
            .commit(Some("main"), &json!({"keep": 1}), None)
            .unwrap();

        let result = engine.merge("feature", Some("main")).unwrap();
        assert!(!result.has_conflicts());
        assert_eq!(result.merged(), &json!({"keep": 1, "fresh": 3}));
    }

    // -----------------------------------------------------------------------
    // Conflict surfacing & resolution (scenario: merge conflict surface)
    // -----------------------------------------------------------------------

    #[test]
    fn conflicting_edits_surface_with_all_three_values() {
        let engine = engine();
        engine.commit(None, &json!({"v": "o"}), None).unwrap();
        engine.create_branch("feature", None).unwrap();
        engine
            .commit(Some("feature"), &json!({"v": "f"}), None)
            .unwrap();
        engine
            .commit(Some("main"), &json!({"v": "m"}), None)
            .unwrap();

        let mut result = engine.merge("feature", Some("main")).unwrap();
        assert_eq!(result.conflicts().len(), 1);
        let conflict = &result.conflicts()[0];
        assert_eq!(conflict.path, "v");
        assert_eq!(conflict.ancestor, Some(json!("o")));
        assert_eq!(conflict.source, Some(json!("f")));
        assert_eq!(conflict.target, Some(json!("m")));
        // Conflicting paths keep the target's state in the auto-merge.
        assert_eq!(result.merged(), &json!({"v": "m"}));

        result
            .resolve_with(&engine, Some(&resolutions(&[("v", json!("r"))])), None)
            .unwrap();
        assert_eq!(engine.branch_data("main").unwrap(), json!({"v": "r"}));
    }

    #[test]
    fn wholesale_replace_conflicts_with_pointwise_edit() {
        let engine = engine();
        engine
            .commit(None, &json!({"user": {"name": "a", "age": 1}}), None)
            .unwrap();
        engine.create_branch("feature", None).unwrap();
        engine
            .commit(Some("feature"), &json!({"user": "collapsed"}), None)
            .unwrap();
        engine
            .commit(Some("main"), &json!({"user": {"name": "b", "age": 1}}), None)
            .unwrap();

        let result = engine.merge("feature", Some("main")).unwrap();
        assert_eq!(result.conflicts().len(), 1);
        assert_eq!(result.conflicts()[0].path, "user");
        // The conflicting subtree stays as the target wrote it.
        assert_eq!(result.merged(), &json!({"user": {"name": "b", "age": 1}}));
    }

    #[test]
    fn non_conflicting_edits_survive_alongside_conflicts() {
        let engine = engine();
        engine
            .commit(None, &json!({"v": 1, "side": 1}), None)
            .unwrap();
        engine.create_branch("feature", None).unwrap();
        engine
            .commit(Some("feature"), &json!({"v": 2, "side": 9}), None)
            .unwrap();
        engine
            .commit(Some("main"), &json!({"v": 3, "side": 1}), None)
            .unwrap();

        let result = engine.merge("feature", Some("main")).unwrap();
        assert_eq!(result.conflicts().len(), 1);
        assert_eq!(result.conflicts()[0].path, "v");
        // The clean `side` edit rode along; the conflict kept target state.
        assert_eq!(result.merged(), &json!({"v": 3, "side": 9}));
    }

    #[test]
    fn conflict_values_may_be_absent() {
        let engine = engine();
        engine.commit(None, &json!({}), None).unwrap();
        engine.create_branch("feature", None).unwrap();
        engine
            .commit(Some("feature"), &json!({"fresh": "f"}), None)
            .unwrap();
        engine
            .commit(Some("main"), &json!({"fresh": "m"}), None)
            .unwrap();

        let result = engine.merge("feature", Some("main")).unwrap();
        assert_eq!(result.conflicts().len(), 1);
        let conflict = &result.conflicts()[0];
        assert_eq!(conflict.path, "fresh");
        assert_eq!(conflict.ancestor, None);
        assert_eq!(conflict.source, Some(json!("f")));
        assert_eq!(conflict.target, Some(json!("m")));
    }

    #[test]
    fn merge_target_defaults_to_current_branch() {
        let engine = engine();
        engine.commit(None, &json!({"v": 1}), None).unwrap();
        engine.create_branch("feature", None).unwrap();
        engine
            .commit(Some("feature"), &json!({"v": 1, "f": 2}), None)
            .unwrap();

        let result = engine.merge("feature", None).unwrap();
        assert_eq!(result.target_branch(), "main");
        assert_eq!(result.source_branch(), "feature");
    }

    // -----------------------------------------------------------------------
    // MergeResult lifecycle (M1)
    // -----------------------------------------------------------------------

    #[test]
    fn apply_with_conflicts_fails() {
        let engine = engine();
        engine.commit(None, &json!({"v": "o"}), None).unwrap();
        engine.create_branch("feature", None).unwrap();
        engine.commit(Some("feature"), &json!({"v": "f"}), None).unwrap();
        engine.commit(Some("main"), &json!({"v": "m"}), None).unwrap();

        let mut result = engine.merge("feature", Some("main")).unwrap();
        assert!(matches!(
            result.apply(&engine, None),
            Err(EngineError::UnresolvedConflicts(_))
        ));
        // Failing to apply does not spend the handle.
        assert!(!result.is_applied());
    }

    #[test]
    fn resolve_with_no_resolutions_fails_when_conflicted() {
        let engine = engine();
        engine.commit(None, &json!({"v": "o"}), None).unwrap();
        engine.create_branch("feature", None).unwrap();
        engine.commit(Some("feature"), &json!({"v": "f"}), None).unwrap();
        engine.commit(Some("main"), &json!({"v": "m"}), None).unwrap();

        let mut result = engine.merge("feature", Some("main")).unwrap();
        assert!(matches!(
            result.resolve_with(&engine, None, None),
            Err(EngineError::UnresolvedConflicts(_))
        ));
    }

    #[test]
    fn terminal_operations_run_at_most_once() {
        let engine = engine();
        engine.commit(None, &json!({"v": 1}), None).unwrap();
        engine.create_branch("feature", None).unwrap();
        engine
            .commit(Some("feature"), &json!({"v": 1, "f": 2}), None)
            .unwrap();

        let mut result = engine.merge("feature", Some("main")).unwrap();
        result.apply(&engine, None).unwrap();
        assert!(result.is_applied());
        assert!(matches!(
            result.apply(&engine, None),
            Err(EngineError::MergeAlreadyApplied)
        ));
        assert!(matches!(
            result.resolve_with(&engine, None, None),
            Err(EngineError::MergeAlreadyApplied)
        ));
        assert!(matches!(result.abort(), Err(EngineError::MergeAlreadyApplied)));
    }

    #[test]
    fn abort_spends_the_handle_without_committing() {
        let engine = engine();
        engine.commit(None, &json!({"v": 1}), None).unwrap();
        engine.create_branch("feature", None).unwrap();
        engine
            .commit(Some("feature"), &json!({"v": 2}), None)
            .unwrap();
        let before = engine.history(Some("main")).unwrap().len();

        let mut result = engine.merge("feature", Some("main")).unwrap();
        result.abort().unwrap();
        assert!(result.is_applied());
        assert_eq!(engine.history(Some("main")).unwrap().len(), before);
        assert!(matches!(
            result.apply(&engine, None),
            Err(EngineError::MergeAlreadyApplied)
        ));
    }

    #[test]
    fn resolution_for_a_clean_path_overwrites_merged() {
        let engine = engine();
        engine.commit(None, &json!({"v": 1}), None).unwrap();
        engine.create_branch("feature", None).unwrap();
        engine
            .commit(Some("feature"), &json!({"v": 1, "f": 2}), None)
            .unwrap();

        let mut result = engine.merge("feature", Some("main")).unwrap();
        assert!(!result.has_conflicts());
        result
            .resolve_with(
                &engine,
                Some(&resolutions(&[("override", json!("extra"))])),
                Some("custom message"),
            )
            .unwrap();
        assert_eq!(
            engine.branch_data("main").unwrap(),
            json!({"v": 1, "f": 2, "override": "extra"})
        );
    }

    // -----------------------------------------------------------------------
    // Ancestor discovery across crossing histories
    // -----------------------------------------------------------------------

    #[test]
    fn ancestor_is_the_divergence_point_not_an_older_commit() {
        let engine = engine();
        engine.commit_at(None, &json!({"gen": 1}), None, 1_000).unwrap();
        engine.commit_at(None, &json!({"gen": 2}), None, 2_000).unwrap();
        engine.create_branch("feature", None).unwrap();
        engine
            .commit_at(Some("feature"), &json!({"gen": 2, "f": 1}), None, 3_000)
            .unwrap();
        engine
            .commit_at(Some("main"), &json!({"gen": 2, "m": 1}), None, 4_000)
            .unwrap();

        let result = engine.merge("feature", Some("main")).unwrap();
        // Base is {"gen": 2}, so neither side's addition conflicts.
        assert!(!result.has_conflicts());
        assert_eq!(result.merged(), &json!({"gen": 2, "f": 1, "m": 1}));

        let ancestor = engine.data_at_commit(&result.ancestor()).unwrap();
        assert_eq!(ancestor, json!({"gen": 2}));
    }

    #[test]
    fn merge_after_merge_uses_the_newer_shared_commit() {
        let engine = engine();
        engine.commit(None, &json!({"v": 1}), None).unwrap();
        engine.create_branch("feature", None).unwrap();
        engine
            .commit(Some("feature"), &json!({"v": 1, "f": 1}), None)
            .unwrap();

        // First merge brings feature's work into main.
        let mut first = engine.merge("feature", Some("main")).unwrap();
        let merge_commit = first.apply(&engine, None).unwrap();

        // feature keeps moving; merge again.
        engine.create_branch("feature2", Some("main")).unwrap();
        engine
            .commit(Some("feature2"), &json!({"v": 1, "f": 1, "g": 2}), None)
            .unwrap();
        let second = engine.merge("feature2", Some("main")).unwrap();
        assert!(!second.has_conflicts());
        // The base is the merge commit itself, the newest shared point.
        assert_eq!(second.ancestor(), merge_commit.hash);
    }
}
