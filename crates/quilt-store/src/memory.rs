use std::collections::HashMap;
use std::sync::RwLock;

use quilt_types::Commit;

use crate::error::StoreResult;
use crate::traits::Backend;

/// In-memory, HashMap-based backend.
///
/// Intended for tests and embedding. All three namespaces are held in memory
/// behind `RwLock`s; data is lost when the backend is dropped. Ref writes are
/// atomic by construction (a single map insert under the write lock).
pub struct MemoryBackend {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    refs: RwLock<HashMap<String, String>>,
    commits: RwLock<HashMap<String, Commit>>,
    /// branch → commit hashes in insertion order (the branch index).
    by_branch: RwLock<HashMap<String, Vec<String>>>,
}

impl MemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            refs: RwLock::new(HashMap::new()),
            commits: RwLock::new(HashMap::new()),
            by_branch: RwLock::new(HashMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn object_count(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Number of commit records currently stored.
    pub fn commit_count(&self) -> usize {
        self.commits.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no namespace holds any data.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
            && self.refs.read().expect("lock poisoned").is_empty()
            && self.commits.read().expect("lock poisoned").is_empty()
    }

    /// Remove all data from all namespaces.
    pub fn clear(&self) {
        self.objects.write().expect("lock poisoned").clear();
        self.refs.write().expect("lock poisoned").clear();
        self.commits.write().expect("lock poisoned").clear();
        self.by_branch.write().expect("lock poisoned").clear();
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    fn put_object(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        let mut objects = self.objects.write().expect("lock poisoned");
        // Content-addressed: the same key always maps to the same bytes, so
        // a repeated write is a no-op.
        objects.entry(key.to_string()).or_insert_with(|| bytes.to_vec());
        Ok(())
    }

    fn get_object(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let objects = self.objects.read().expect("lock poisoned");
        Ok(objects.get(key).cloned())
    }

    fn object_exists(&self, key: &str) -> StoreResult<bool> {
        let objects = self.objects.read().expect("lock poisoned");
        Ok(objects.contains_key(key))
    }

    fn delete_object(&self, key: &str) -> StoreResult<bool> {
        let mut objects = self.objects.write().expect("lock poisoned");
        Ok(objects.remove(key).is_some())
    }

    fn save_ref(&self, name: &str, value: &str) -> StoreResult<()> {
        let mut refs = self.refs.write().expect("lock poisoned");
        refs.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn get_ref(&self, name: &str) -> StoreResult<Option<String>> {
        let refs = self.refs.read().expect("lock poisoned");
        Ok(refs.get(name).cloned())
    }

    fn delete_ref(&self, name: &str) -> StoreResult<bool> {
        let mut refs = self.refs.write().expect("lock poisoned");
        Ok(refs.remove(name).is_some())
    }

    fn list_refs(&self, prefix: &str) -> StoreResult<Vec<(String, String)>> {
        let refs = self.refs.read().expect("lock poisoned");
        let mut result: Vec<(String, String)> = refs
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        result.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(result)
    }

    fn save_commit(&self, commit: &Commit) -> StoreResult<()> {
        let key = commit.hash.to_hex();
        let mut commits = self.commits.write().expect("lock poisoned");
        let mut by_branch = self.by_branch.write().expect("lock poisoned");
        let index = by_branch.entry(commit.branch.clone()).or_default();
        if !index.contains(&key) {
            index.push(key.clone());
        }
        commits.insert(key, commit.clone());
        Ok(())
    }

    fn get_commit(&self, hash: &str) -> StoreResult<Option<Commit>> {
        let commits = self.commits.read().expect("lock poisoned");
        Ok(commits.get(hash).cloned())
    }

    fn commits_for_branch(&self, branch: &str) -> StoreResult<Vec<Commit>> {
        let commits = self.commits.read().expect("lock poisoned");
        let by_branch = self.by_branch.read().expect("lock poisoned");
        let mut result: Vec<Commit> = by_branch
            .get(branch)
            .map(|hashes| {
                hashes
                    .iter()
                    .filter_map(|h| commits.get(h).cloned())
                    .collect()
            })
            .unwrap_or_default();
        // Stable sort keeps insertion order among equal timestamps.
        result.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(result)
    }

    fn commits_before(&self, branch: &str, ts_ms: u64) -> StoreResult<Vec<Commit>> {
        let mut result = self.commits_for_branch(branch)?;
        result.retain(|c| c.timestamp <= ts_ms);
        Ok(result)
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("objects", &self.object_count())
            .field("commits", &self.commit_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quilt_types::ObjectHash;

    fn commit_on(branch: &str, data: &[u8], ts: u64) -> Commit {
        Commit::build(ObjectHash::from_bytes(data), None, branch, "m", ts).unwrap()
    }

    // -----------------------------------------------------------------------
    // Objects namespace
    // -----------------------------------------------------------------------

    #[test]
    fn object_roundtrip() {
        let backend = MemoryBackend::new();
        backend.put_object("abc123", b"node bytes").unwrap();
        assert_eq!(
            backend.get_object("abc123").unwrap(),
            Some(b"node bytes".to_vec())
        );
        assert!(backend.object_exists("abc123").unwrap());
    }

    #[test]
    fn missing_object_is_none() {
        let backend = MemoryBackend::new();
        assert!(backend.get_object("missing").unwrap().is_none());
        assert!(!backend.object_exists("missing").unwrap());
    }

    #[test]
    fn repeated_put_is_noop() {
        let backend = MemoryBackend::new();
        backend.put_object("k", b"first").unwrap();
        backend.put_object("k", b"second").unwrap();
        assert_eq!(backend.get_object("k").unwrap(), Some(b"first".to_vec()));
        assert_eq!(backend.object_count(), 1);
    }

    #[test]
    fn delete_object() {
        let backend = MemoryBackend::new();
        backend.put_object("k", b"v").unwrap();
        assert!(backend.delete_object("k").unwrap());
        assert!(!backend.delete_object("k").unwrap());
        assert!(!backend.object_exists("k").unwrap());
    }

    // -----------------------------------------------------------------------
    // Refs namespace
    // -----------------------------------------------------------------------

    #[test]
    fn ref_roundtrip_and_update() {
        let backend = MemoryBackend::new();
        backend.save_ref("branch/main", "aaaa").unwrap();
        assert_eq!(
            backend.get_ref("branch/main").unwrap(),
            Some("aaaa".to_string())
        );
        backend.save_ref("branch/main", "bbbb").unwrap();
        assert_eq!(
            backend.get_ref("branch/main").unwrap(),
            Some("bbbb".to_string())
        );
    }

    #[test]
    fn delete_ref() {
        let backend = MemoryBackend::new();
        backend.save_ref("branch/tmp", "cccc").unwrap();
        assert!(backend.delete_ref("branch/tmp").unwrap());
        assert!(!backend.delete_ref("branch/tmp").unwrap());
        assert!(backend.get_ref("branch/tmp").unwrap().is_none());
    }

    #[test]
    fn list_refs_filters_and_sorts() {
        let backend = MemoryBackend::new();
        backend.save_ref("branch/zeta", "1").unwrap();
        backend.save_ref("branch/alpha", "2").unwrap();
        backend.save_ref("HEAD", "branch/alpha").unwrap();

        let branches = backend.list_refs("branch/").unwrap();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].0, "branch/alpha");
        assert_eq!(branches[1].0, "branch/zeta");

        let all = backend.list_refs("").unwrap();
        assert_eq!(all.len(), 3);
    }

    // -----------------------------------------------------------------------
    // Commits namespace
    // -----------------------------------------------------------------------

    #[test]
    fn commit_roundtrip() {
        let backend = MemoryBackend::new();
        let commit = commit_on("main", b"v1", 100);
        backend.save_commit(&commit).unwrap();
        let back = backend.get_commit(&commit.hash.to_hex()).unwrap().unwrap();
        assert_eq!(back, commit);
    }

    #[test]
    fn commits_for_branch_is_timestamp_descending() {
        let backend = MemoryBackend::new();
        backend.save_commit(&commit_on("main", b"a", 100)).unwrap();
        backend.save_commit(&commit_on("main", b"b", 300)).unwrap();
        backend.save_commit(&commit_on("main", b"c", 200)).unwrap();
        backend.save_commit(&commit_on("other", b"d", 400)).unwrap();

        let commits = backend.commits_for_branch("main").unwrap();
        let stamps: Vec<u64> = commits.iter().map(|c| c.timestamp).collect();
        assert_eq!(stamps, vec![300, 200, 100]);
    }

    #[test]
    fn commits_before_filters_inclusive() {
        let backend = MemoryBackend::new();
        backend.save_commit(&commit_on("main", b"a", 100)).unwrap();
        backend.save_commit(&commit_on("main", b"b", 200)).unwrap();
        backend.save_commit(&commit_on("main", b"c", 300)).unwrap();

        let commits = backend.commits_before("main", 200).unwrap();
        let stamps: Vec<u64> = commits.iter().map(|c| c.timestamp).collect();
        assert_eq!(stamps, vec![200, 100]);
    }

    #[test]
    fn resaving_a_commit_does_not_duplicate_the_index() {
        let backend = MemoryBackend::new();
        let commit = commit_on("main", b"same", 100);
        backend.save_commit(&commit).unwrap();
        backend.save_commit(&commit).unwrap();
        assert_eq!(backend.commits_for_branch("main").unwrap().len(), 1);
    }

    #[test]
    fn unknown_branch_lists_empty() {
        let backend = MemoryBackend::new();
        assert!(backend.commits_for_branch("nope").unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    #[test]
    fn clear_empties_every_namespace() {
        let backend = MemoryBackend::new();
        backend.put_object("k", b"v").unwrap();
        backend.save_ref("branch/main", "h").unwrap();
        backend.save_commit(&commit_on("main", b"v", 1)).unwrap();
        assert!(!backend.is_empty());

        backend.clear();
        assert!(backend.is_empty());
        assert!(backend.commits_for_branch("main").unwrap().is_empty());
    }
}
