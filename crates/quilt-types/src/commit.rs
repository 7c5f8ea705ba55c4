use serde::{Deserialize, Serialize};

use crate::canon::hash_value;
use crate::error::TypeError;
use crate::hash::ObjectHash;

/// An immutable commit record.
///
/// A commit binds a snapshot (the root Merkle hash) to its position in a
/// branch history: the parent commit, the branch it was created on, a
/// message, and a millisecond timestamp. The `branch` field is historical
/// attribution; a commit is not re-attributed when its hash is reached from
/// another branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// The commit's identity.
    pub hash: ObjectHash,
    /// Hash of the commit that was the branch head when this one was made,
    /// or `None` for a root commit.
    pub parent: Option<ObjectHash>,
    /// Branch the commit was created on.
    pub branch: String,
    /// Caller-supplied message.
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Root hash of the snapshot's Merkle tree.
    #[serde(rename = "rootHash")]
    pub root_hash: ObjectHash,
}

/// Salt tuple for commits whose snapshot equals the parent's.
#[derive(Serialize)]
struct SaltedIdentity<'a> {
    message: &'a str,
    parent: &'a ObjectHash,
    #[serde(rename = "rootHash")]
    root_hash: &'a ObjectHash,
    timestamp: u64,
}

impl Commit {
    /// Assemble a commit record, deriving its identity.
    ///
    /// A commit is normally identified by its snapshot: `hash == root_hash`.
    /// When the snapshot is identical to the parent commit's snapshot, that
    /// identity would collide with the parent, so the hash is instead derived
    /// from the `{message, parent, rootHash, timestamp}` tuple. Committing
    /// unchanged data with a new message or timestamp therefore creates a
    /// distinct record rather than overwriting the parent's.
    pub fn build(
        root_hash: ObjectHash,
        parent: Option<&Commit>,
        branch: impl Into<String>,
        message: impl Into<String>,
        timestamp: u64,
    ) -> Result<Self, TypeError> {
        let message = message.into();
        let hash = match parent {
            Some(p) if p.root_hash == root_hash => hash_value(&SaltedIdentity {
                message: &message,
                parent: &p.hash,
                root_hash: &root_hash,
                timestamp,
            })?,
            _ => root_hash,
        };
        Ok(Self {
            hash,
            parent: parent.map(|p| p.hash),
            branch: branch.into(),
            message,
            timestamp,
            root_hash,
        })
    }

    /// Returns `true` if this commit has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
