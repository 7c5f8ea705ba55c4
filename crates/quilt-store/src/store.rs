use quilt_types::{Commit, ObjectHash};

use crate::error::StoreResult;
use crate::traits::Backend;

/// Typed facade over a [`Backend`].
///
/// The engine never touches raw keys: this layer converts [`ObjectHash`]es to
/// the hex key form and carries [`Commit`] records across the boundary. One
/// `Store` is bound to one database name for its whole lifetime.
pub struct Store {
    name: String,
    backend: Box<dyn Backend>,
}

impl Store {
    /// Bind a store to a database name over the given backend.
    pub fn new(name: impl Into<String>, backend: Box<dyn Backend>) -> Self {
        Self {
            name: name.into(),
            backend,
        }
    }

    /// The database name this store is bound to.
    pub fn name(&self) -> &str {
        &self.name
    }

    // ---- objects ----

    /// Write node bytes under their hash, skipping the write when the node
    /// is already present (content addressing makes it identical).
    pub fn put_node(&self, hash: &ObjectHash, bytes: &[u8]) -> StoreResult<()> {
        let key = hash.to_hex();
        if self.backend.object_exists(&key)? {
            return Ok(());
        }
        self.backend.put_object(&key, bytes)
    }

    /// Read node bytes by hash. Returns `Ok(None)` if absent.
    pub fn get_node(&self, hash: &ObjectHash) -> StoreResult<Option<Vec<u8>>> {
        self.backend.get_object(&hash.to_hex())
    }

    /// Check whether a node exists.
    pub fn has_node(&self, hash: &ObjectHash) -> StoreResult<bool> {
        self.backend.object_exists(&hash.to_hex())
    }

    // ---- refs ----

    pub fn save_ref(&self, name: &str, value: &str) -> StoreResult<()> {
        self.backend.save_ref(name, value)
    }

    pub fn get_ref(&self, name: &str) -> StoreResult<Option<String>> {
        self.backend.get_ref(name)
    }

    pub fn delete_ref(&self, name: &str) -> StoreResult<bool> {
        self.backend.delete_ref(name)
    }

    pub fn list_refs(&self, prefix: &str) -> StoreResult<Vec<(String, String)>> {
        self.backend.list_refs(prefix)
    }

    // ---- commits ----

    pub fn save_commit(&self, commit: &Commit) -> StoreResult<()> {
        self.backend.save_commit(commit)
    }

    pub fn get_commit(&self, hash: &ObjectHash) -> StoreResult<Option<Commit>> {
        self.backend.get_commit(&hash.to_hex())
    }

    /// All commits attributed to `branch`, timestamp-descending.
    pub fn commits_for_branch(&self, branch: &str) -> StoreResult<Vec<Commit>> {
        self.backend.commits_for_branch(branch)
    }

    /// The most recent commit on `branch` with `timestamp <= ts_ms`.
    pub fn latest_commit_before(&self, branch: &str, ts_ms: u64) -> StoreResult<Option<Commit>> {
        Ok(self.backend.commits_before(branch, ts_ms)?.into_iter().next())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("name", &self.name).finish()
    }
}
