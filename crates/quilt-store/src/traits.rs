use quilt_types::Commit;

use crate::error::StoreResult;

/// Persistence contract consumed by the engine.
///
/// A backend exposes three namespaces of one database:
///
/// - `objects`: opaque node bytes keyed by hex hash strings. Content
///   addressing means a key is only ever written with one value, so
///   re-writes are harmless.
/// - `refs`: small mutable name → string entries. `save_ref` must be atomic;
///   the engine's crash-recovery argument depends on it.
/// - `commits`: commit records keyed by hash, with a secondary index on
///   `(branch, timestamp)` for the listing calls.
///
/// All I/O errors are propagated, never silently ignored. The engine does
/// not retry.
pub trait Backend: Send + Sync {
    /// Write object bytes under a hex hash key.
    fn put_object(&self, key: &str, bytes: &[u8]) -> StoreResult<()>;

    /// Read object bytes. Returns `Ok(None)` if the key is absent.
    fn get_object(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Check whether an object key exists.
    fn object_exists(&self, key: &str) -> StoreResult<bool>;

    /// Delete an object. Returns `true` if it existed. Intended for external
    /// garbage collection; the engine never calls this.
    fn delete_object(&self, key: &str) -> StoreResult<bool>;

    /// Write (create or update) a ref. Must be atomic per ref.
    fn save_ref(&self, name: &str, value: &str) -> StoreResult<()>;

    /// Read a ref. Returns `Ok(None)` if the ref does not exist.
    fn get_ref(&self, name: &str) -> StoreResult<Option<String>>;

    /// Delete a ref. Returns `true` if it existed.
    fn delete_ref(&self, name: &str) -> StoreResult<bool>;

    /// List refs whose name starts with `prefix`, sorted by name.
    fn list_refs(&self, prefix: &str) -> StoreResult<Vec<(String, String)>>;

    /// Write a commit record under its hash.
    fn save_commit(&self, commit: &Commit) -> StoreResult<()>;

    /// Read a commit record by hex hash. Returns `Ok(None)` if absent.
    fn get_commit(&self, hash: &str) -> StoreResult<Option<Commit>>;

    /// All commits attributed to `branch`, timestamp-descending.
    fn commits_for_branch(&self, branch: &str) -> StoreResult<Vec<Commit>>;

    /// Commits attributed to `branch` with `timestamp <= ts_ms`,
    /// timestamp-descending.
    fn commits_before(&self, branch: &str, ts_ms: u64) -> StoreResult<Vec<Commit>>;
}

// A shared backend is a backend. Lets embedders keep a handle for
// introspection while the engine owns its own.
impl<B: Backend + ?Sized> Backend for std::sync::Arc<B> {
    fn put_object(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        (**self).put_object(key, bytes)
    }

    fn get_object(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).get_object(key)
    }

    fn object_exists(&self, key: &str) -> StoreResult<bool> {
        (**self).object_exists(key)
    }

    fn delete_object(&self, key: &str) -> StoreResult<bool> {
        (**self).delete_object(key)
    }

    fn save_ref(&self, name: &str, value: &str) -> StoreResult<()> {
        (**self).save_ref(name, value)
    }

    fn get_ref(&self, name: &str) -> StoreResult<Option<String>> {
        (**self).get_ref(name)
    }

    fn delete_ref(&self, name: &str) -> StoreResult<bool> {
        (**self).delete_ref(name)
    }

    fn list_refs(&self, prefix: &str) -> StoreResult<Vec<(String, String)>> {
        (**self).list_refs(prefix)
    }

    fn save_commit(&self, commit: &Commit) -> StoreResult<()> {
        (**self).save_commit(commit)
    }

    fn get_commit(&self, hash: &str) -> StoreResult<Option<Commit>> {
        (**self).get_commit(hash)
    }

    fn commits_for_branch(&self, branch: &str) -> StoreResult<Vec<Commit>> {
        (**self).commits_for_branch(branch)
    }

    fn commits_before(&self, branch: &str, ts_ms: u64) -> StoreResult<Vec<Commit>> {
        (**self).commits_before(branch, ts_ms)
    }
}
