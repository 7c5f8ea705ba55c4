use std::collections::BTreeMap;

use serde_json::Value;

use quilt_store::Store;
use quilt_types::ObjectHash;

use crate::error::{MerkleError, MerkleResult};
use crate::node::{ContainerType, InternalNode, LeafNode, MerkleNode};

/// A fully materialized node of a [`MerkleTree`].
#[derive(Clone, Debug, PartialEq)]
pub enum TreeNode {
    Leaf {
        hash: ObjectHash,
        leaf: LeafNode,
    },
    Internal {
        hash: ObjectHash,
        kind: ContainerType,
        children: BTreeMap<String, TreeNode>,
    },
}

impl TreeNode {
    /// This node's content hash.
    pub fn hash(&self) -> ObjectHash {
        match self {
            Self::Leaf { hash, .. } | Self::Internal { hash, .. } => *hash,
        }
    }

    /// The persisted record form of this node.
    fn to_record(&self) -> MerkleNode {
        match self {
            Self::Leaf { leaf, .. } => MerkleNode::Leaf(leaf.clone()),
            Self::Internal { kind, children, .. } => MerkleNode::Internal(InternalNode {
                kind: *kind,
                children: children
                    .iter()
                    .map(|(key, child)| (key.clone(), child.hash()))
                    .collect(),
            }),
        }
    }
}

/// A content-addressed tree built from a JSON-shaped value.
///
/// Structurally equal values produce identical hashes at every level, so
/// equality of root hashes implies equality of values and shared subtrees
/// deduplicate automatically.
#[derive(Clone, Debug, PartialEq)]
pub struct MerkleTree {
    root: TreeNode,
}

impl MerkleTree {
    /// Build a tree from a value.
    ///
    /// Objects and arrays become internal nodes (array elements keyed by
    /// stringified index); primitives become leaves. `serde_json::Value` is
    /// acyclic by construction, so the input is always a tree.
    pub fn from_value(value: &Value) -> MerkleResult<Self> {
        Ok(Self {
            root: build_node(value)?,
        })
    }

    /// The root node.
    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// The root hash.
    pub fn root_hash(&self) -> ObjectHash {
        self.root.hash()
    }

    /// Persist every node under its hash, depth-first post-order, and return
    /// the root hash. Nodes already present are skipped.
    pub fn store(&self, store: &Store) -> MerkleResult<ObjectHash> {
        store_node(&self.root, store)?;
        Ok(self.root_hash())
    }

    /// Load the tree rooted at `hash` from the store.
    ///
    /// A referenced node that is missing or undecodable is corruption and
    /// fails hard with [`MerkleError::CorruptObject`].
    pub fn load(store: &Store, hash: &ObjectHash) -> MerkleResult<Self> {
        Ok(Self {
            root: load_node(store, hash)?,
        })
    }

    /// Project the tree back into a value.
    pub fn to_value(&self) -> Value {
        node_to_value(&self.root)
    }

    /// Structural diff against another tree.
    ///
    /// Recurses only where hashes differ; equal subtrees are skipped without
    /// descent. A subtree whose container type changes (object↔array, or
    /// leaf↔internal) is reported as a single `modified` at that path.
    pub fn diff(&self, other: &Self) -> TreeDiff {
        let mut out = TreeDiff::default();
        diff_nodes(ROOT_PATH, &self.root, &other.root, &mut out);
        out
    }
}

/// Structural diff between two trees: dotted paths partitioned by change
/// kind. Used for audit and analysis; merge uses the value-level diff.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeDiff {
    /// Paths present only in the right tree.
    pub added: Vec<String>,
    /// Paths present in both whose content differs.
    pub modified: Vec<String>,
    /// Paths present only in the left tree.
    pub deleted: Vec<String>,
}

impl TreeDiff {
    /// Returns `true` if the trees were identical.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Total number of reported paths.
    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }
}

const ROOT_PATH: &str = ".";

fn join_path(parent: &str, key: &str) -> String {
    if parent == ROOT_PATH {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn build_node(value: &Value) -> MerkleResult<TreeNode> {
    if let Some(leaf) = LeafNode::classify(value) {
        let hash = MerkleNode::Leaf(leaf.clone())
            .compute_hash()
            .map_err(|e| MerkleError::Serialization(e.to_string()))?;
        return Ok(TreeNode::Leaf { hash, leaf });
    }

    let (kind, entries): (ContainerType, Vec<(String, &Value)>) = match value {
        Value::Object(map) => (
            ContainerType::Object,
            map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        ),
        Value::Array(items) => (
            ContainerType::Array,
            items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
        ),
        _ => unreachable!("primitives are classified as leaves"),
    };

    let mut children = BTreeMap::new();
    for (key, child_value) in entries {
        children.insert(key, build_node(child_value)?);
    }

    let record = MerkleNode::Internal(InternalNode {
        kind,
        children: children
            .iter()
            .map(|(key, child)| (key.clone(), child.hash()))
            .collect(),
    });
    let hash = record
        .compute_hash()
        .map_err(|e| MerkleError::Serialization(e.to_string()))?;

    Ok(TreeNode::Internal {
        hash,
        kind,
        children,
    })
}

fn store_node(node: &TreeNode, store: &Store) -> MerkleResult<()> {
    // Post-order writes mean an existing node implies its whole subtree is
    // already present, so shared subtrees are skipped without descent.
    if store.has_node(&node.hash())? {
        return Ok(());
    }
    if let TreeNode::Internal { children, .. } = node {
        for child in children.values() {
            store_node(child, store)?;
        }
    }
    let bytes = node
        .to_record()
        .canonical_bytes()
        .map_err(|e| MerkleError::Serialization(e.to_string()))?;
    store.put_node(&node.hash(), &bytes)?;
    Ok(())
}

fn load_node(store: &Store, hash: &ObjectHash) -> MerkleResult<TreeNode> {
    let bytes = store
        .get_node(hash)?
        .ok_or_else(|| MerkleError::CorruptObject {
            hash: *hash,
            reason: "referenced node is absent".to_string(),
        })?;
    let record: MerkleNode =
        serde_json::from_slice(&bytes).map_err(|e| MerkleError::CorruptObject {
            hash: *hash,
            reason: format!("undecodable node: {e}"),
        })?;

    match record {
        MerkleNode::Leaf(leaf) => Ok(TreeNode::Leaf { hash: *hash, leaf }),
        MerkleNode::Internal(internal) => {
            let mut children = BTreeMap::new();
            for (key, child_hash) in internal.children {
                children.insert(key, load_node(store, &child_hash)?);
            }
            Ok(TreeNode::Internal {
                hash: *hash,
                kind: internal.kind,
                children,
            })
        }
    }
}

fn node_to_value(node: &TreeNode) -> Value {
    match node {
        TreeNode::Leaf { leaf, .. } => leaf.value.clone(),
        TreeNode::Internal {
            kind: ContainerType::Object,
            children,
            ..
        } => Value::Object(
            children
                .iter()
                .map(|(key, child)| (key.clone(), node_to_value(child)))
                .collect(),
        ),
        TreeNode::Internal {
            kind: ContainerType::Array,
            children,
            ..
        } => {
            // Keys are stringified indices; iterate numerically, not
            // lexicographically, so arrays of length >= 10 rebuild in order.
            let mut indexed: Vec<(usize, Value)> = children
                .iter()
                .filter_map(|(key, child)| {
                    key.parse::<usize>().ok().map(|i| (i, node_to_value(child)))
                })
                .collect();
            indexed.sort_by_key(|(i, _)| *i);
            Value::Array(indexed.into_iter().map(|(_, v)| v).collect())
        }
    }
}

fn diff_nodes(path: &str, left: &TreeNode, right: &TreeNode, out: &mut TreeDiff) {
    if left.hash() == right.hash() {
        return;
    }
    match (left, right) {
        (
            TreeNode::Internal {
                kind: left_kind,
                children: left_children,
                ..
            },
            TreeNode::Internal {
                kind: right_kind,
                children: right_children,
                ..
            },
        ) if left_kind == right_kind => {
            for (key, left_child) in left_children {
                let child_path = join_path(path, key);
                match right_children.get(key) {
                    Some(right_child) => diff_nodes(&child_path, left_child, right_child, out),
                    None => out.deleted.push(child_path),
                }
            }
            for key in right_children.keys() {
                if !left_children.contains_key(key) {
                    out.added.push(join_path(path, key));
                }
            }
        }
        // Leaf change or container type change: one modification here.
        _ => out.modified.push(path.to_string()),
    }
}

/// Longest shared prefix of a set of dotted paths, at segment granularity.
///
/// Returns `"."` when the paths share no leading segment (or the list is
/// empty). Useful for summarizing where a group of conflicts lives.
pub fn common_prefix<S: AsRef<str>>(paths: &[S]) -> String {
    fn segments(path: &str) -> Vec<&str> {
        if path == ROOT_PATH {
            Vec::new()
        } else {
            path.split('.').collect()
        }
    }

    let Some(first) = paths.first() else {
        return ROOT_PATH.to_string();
    };
    let first = segments(first.as_ref());
    let mut shared = first.len();
    for path in &paths[1..] {
        let segs = segments(path.as_ref());
        let mut i = 0;
        while i < shared.min(segs.len()) && segs[i] == first[i] {
            i += 1;
        }
        shared = i;
    }
    if shared == 0 {
        ROOT_PATH.to_string()
    } else {
        first[..shared].join(".")
    }
}
