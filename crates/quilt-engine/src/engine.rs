use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value};
use tracing::debug;

use quilt_merkle::MerkleTree;
use quilt_store::{branch_name, branch_ref, validate_branch_name, Backend, Store, HEAD_REF};
use quilt_types::{Commit, ObjectHash};

use crate::error::{EngineError, EngineResult};

/// The branch created on first initialization.
pub const DEFAULT_BRANCH: &str = "main";

const DEFAULT_COMMIT_MESSAGE: &str = "Update";

/// A long-lived engine handle bound to one database.
///
/// Operations are single-threaded cooperative: each suspends only at storage
/// boundaries and the engine holds no locks of its own. Two engines racing on
/// the same branch ref can lose an update; cross-process concurrency control
/// is out of scope.
pub struct Engine {
    store: Store,
    initialized: AtomicBool,
}

impl Engine {
    /// Bind an engine to a database name over the given backend.
    ///
    /// The handle is inert until [`Engine::init`] runs.
    pub fn new(name: impl Into<String>, backend: Box<dyn Backend>) -> Self {
        Self {
            store: Store::new(name, backend),
            initialized: AtomicBool::new(false),
        }
    }

    /// Initialize the database.
    ///
    /// On first use, commits an empty object as the root of `main` and points
    /// `HEAD` at it. A database that already has a `main` branch is left
    /// untouched. Idempotent.
    pub fn init(&self) -> EngineResult<()> {
        let main_ref = branch_ref(DEFAULT_BRANCH);
        if self.store.get_ref(&main_ref)?.is_some() {
            self.initialized.store(true, Ordering::SeqCst);
            return Ok(());
        }

        let tree = MerkleTree::from_value(&Value::Object(Map::new()))?;
        let root = tree.store(&self.store)?;
        let commit = Commit::build(root, None, DEFAULT_BRANCH, "Initial commit", now_ms())?;
        // Commit record first, ref second: a crash in between leaves an
        // unreachable commit, never a dangling ref.
        self.store.save_commit(&commit)?;
        self.store.save_ref(&main_ref, &commit.hash.to_hex())?;
        self.store.save_ref(HEAD_REF, &main_ref)?;
        debug!(db = %self.store.name(), root = %root.short_hex(), "initialized database");

        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Release the handle. Subsequent operations fail until `init` again.
    pub fn close(&self) {
        self.initialized.store(false, Ordering::SeqCst);
    }

    pub(crate) fn ensure_initialized(&self) -> EngineResult<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(EngineError::NotInitialized)
        }
    }

    // ---- branches & HEAD ----

    /// Name of the currently checked-out branch.
    pub fn current_branch(&self) -> EngineResult<String> {
        self.ensure_initialized()?;
        let head = self
            .store
            .get_ref(HEAD_REF)?
            .ok_or_else(|| EngineError::RefNotFound(HEAD_REF.to_string()))?;
        branch_name(&head)
            .map(str::to_string)
            .ok_or(EngineError::DetachedHead(head))
    }

    /// All branch names, sorted.
    pub fn list_branches(&self) -> EngineResult<Vec<String>> {
        self.ensure_initialized()?;
        let refs = self.store.list_refs(quilt_store::BRANCH_PREFIX)?;
        Ok(refs
            .into_iter()
            .filter_map(|(name, _)| branch_name(&name).map(str::to_string))
            .collect())
    }

    /// Create branch `name` pointing at the head of `src` (default: the
    /// current branch). The new branch shares the source's entire history.
    pub fn create_branch(&self, name: &str, src: Option<&str>) -> EngineResult<()> {
        self.ensure_initialized()?;
        validate_branch_name(name)?;
        let new_ref = branch_ref(name);
        if self.store.get_ref(&new_ref)?.is_some() {
            return Err(EngineError::RefExists(name.to_string()));
        }
        let src = self.resolve_branch(src)?;
        let src_head = self
            .store
            .get_ref(&branch_ref(&src))?
            .ok_or_else(|| EngineError::RefNotFound(src.clone()))?;
        self.store.save_ref(&new_ref, &src_head)?;
        Ok(())
    }

    /// Point `HEAD` at an existing branch.
    pub fn checkout(&self, name: &str) -> EngineResult<()> {
        self.ensure_initialized()?;
        let target = branch_ref(name);
        if self.store.get_ref(&target)?.is_none() {
            return Err(EngineError::RefNotFound(name.to_string()));
        }
        self.store.save_ref(HEAD_REF, &target)?;
        Ok(())
    }

    /// Delete a branch ref. `main` and the checked-out branch are protected.
    /// Commit records and Merkle objects are left in place.
    pub fn delete_branch(&self, name: &str) -> EngineResult<()> {
        self.ensure_initialized()?;
        if name == DEFAULT_BRANCH || name == self.current_branch()? {
            return Err(EngineError::ProtectedBranch(name.to_string()));
        }
        if !self.store.delete_ref(&branch_ref(name))? {
            return Err(EngineError::RefNotFound(name.to_string()));
        }
        Ok(())
    }

    // ---- commits & history ----

    /// Commit `data` onto a branch (default: the current branch) and advance
    /// its head. `HEAD` itself never moves on commit.
    pub fn commit(
        &self,
        branch: Option<&str>,
        data: &Value,
        message: Option<&str>,
    ) -> EngineResult<Commit> {
        self.commit_at(branch, data, message, now_ms())
    }

    /// [`Engine::commit`] with an explicit timestamp, for deterministic
    /// histories (imports, replays, tests).
    pub fn commit_at(
        &self,
        branch: Option<&str>,
        data: &Value,
        message: Option<&str>,
        timestamp: u64,
    ) -> EngineResult<Commit> {
        self.ensure_initialized()?;
        let branch = self.resolve_branch(branch)?;
        let parent = self.head_commit(&branch)?;

        let root = MerkleTree::from_value(data)?.store(&self.store)?;
        let commit = Commit::build(
            root,
            Some(&parent),
            branch.as_str(),
            message.unwrap_or(DEFAULT_COMMIT_MESSAGE),
            timestamp,
        )?;
        // Tree nodes are durable above; commit record must land before the
        // ref moves, or a crash leaves the branch pointing at nothing.
        self.store.save_commit(&commit)?;
        self.store.save_ref(&branch_ref(&branch), &commit.hash.to_hex())?;
        debug!(branch = %branch, commit = %commit.hash.short_hex(), "committed snapshot");
        Ok(commit)
    }

    /// All commits attributed to a branch (default: current),
    /// timestamp-descending.
    ///
    /// Attribution-based: commits created on this branch, not every commit
    /// reachable from its head. History inherited through `create_branch` is
    /// attributed to the source branch.
    pub fn history(&self, branch: Option<&str>) -> EngineResult<Vec<Commit>> {
        self.ensure_initialized()?;
        let branch = self.resolve_branch(branch)?;
        if self.store.get_ref(&branch_ref(&branch))?.is_none() {
            return Err(EngineError::RefNotFound(branch));
        }
        Ok(self.store.commits_for_branch(&branch)?)
    }

    // ---- reads ----

    /// The data at the head of the current branch.
    pub fn data(&self) -> EngineResult<Value> {
        let branch = self.current_branch()?;
        self.branch_data(&branch)
    }

    /// The data at the head of a named branch.
    pub fn branch_data(&self, branch: &str) -> EngineResult<Value> {
        self.ensure_initialized()?;
        let head = self.head_commit(branch)?;
        Ok(MerkleTree::load(&self.store, &head.root_hash)?.to_value())
    }

    /// The data at a specific commit.
    pub fn data_at_commit(&self, hash: &ObjectHash) -> EngineResult<Value> {
        self.ensure_initialized()?;
        let commit = self
            .store
            .get_commit(hash)?
            .ok_or(EngineError::CommitNotFound(*hash))?;
        Ok(MerkleTree::load(&self.store, &commit.root_hash)?.to_value())
    }

    /// The data at the most recent commit on `branch` with
    /// `timestamp <= ts_ms`.
    pub fn data_at(&self, branch: &str, ts_ms: u64) -> EngineResult<Value> {
        self.ensure_initialized()?;
        if self.store.get_ref(&branch_ref(branch))?.is_none() {
            return Err(EngineError::RefNotFound(branch.to_string()));
        }
        let commit = self
            .store
            .latest_commit_before(branch, ts_ms)?
            .ok_or_else(|| EngineError::NoAncestorBefore {
                branch: branch.to_string(),
                timestamp: ts_ms,
            })?;
        Ok(MerkleTree::load(&self.store, &commit.root_hash)?.to_value())
    }

    // ---- internals shared with merge ----

    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn resolve_branch(&self, branch: Option<&str>) -> EngineResult<String> {
        match branch {
            Some(name) => Ok(name.to_string()),
            None => self.current_branch(),
        }
    }

    pub(crate) fn head_commit(&self, branch: &str) -> EngineResult<Commit> {
        let head_hex = self
            .store
            .get_ref(&branch_ref(branch))?
            .ok_or_else(|| EngineError::RefNotFound(branch.to_string()))?;
        let head = ObjectHash::from_hex(&head_hex)?;
        self.store
            .get_commit(&head)?
            .ok_or(EngineError::CommitNotFound(head))
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("db", &self.store.name())
            .field("initialized", &self.initialized.load(Ordering::SeqCst))
            .finish()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
