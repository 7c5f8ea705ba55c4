use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use quilt_types::{canonical_bytes, ObjectHash, TypeError};

/// Type tag carried by leaf nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeafType {
    Null,
    Boolean,
    Number,
    String,
}

/// Type tag carried by internal nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
    Object,
    Array,
}

/// A leaf node: a primitive value with its type tag.
///
/// Persisted as `{"type": ..., "value": ...}` in canonical JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeafNode {
    #[serde(rename = "type")]
    pub kind: LeafType,
    pub value: Value,
}

impl LeafNode {
    /// Classify a primitive value into a leaf, or `None` for composites.
    pub fn classify(value: &Value) -> Option<Self> {
        let kind = match value {
            Value::Null => LeafType::Null,
            Value::Bool(_) => LeafType::Boolean,
            Value::Number(_) => LeafType::Number,
            Value::String(_) => LeafType::String,
            Value::Array(_) | Value::Object(_) => return None,
        };
        Some(Self {
            kind,
            value: value.clone(),
        })
    }
}

/// An internal node: a container whose children are referenced by hash.
///
/// Persisted as `{"type": ..., "children": {key: hex-hash, ...}}`. The
/// children map is a `BTreeMap`, so enumeration (and therefore hashing) is
/// independent of insertion order. Array elements use stringified indices as
/// keys.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InternalNode {
    #[serde(rename = "type")]
    pub kind: ContainerType,
    pub children: BTreeMap<String, ObjectHash>,
}

/// The persisted node record: either a leaf or an internal node.
///
/// The wire form is untagged; the two shapes are distinguished by their
/// `type` tag and by the presence of `value` vs `children`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MerkleNode {
    Internal(InternalNode),
    Leaf(LeafNode),
}

impl MerkleNode {
    /// Canonical bytes of this node, the form it is persisted and hashed in.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, TypeError> {
        canonical_bytes(self)
    }

    /// The node's content hash: SHA-256 of its canonical bytes.
    pub fn compute_hash(&self) -> Result<ObjectHash, TypeError> {
        Ok(ObjectHash::from_bytes(&self.canonical_bytes()?))
    }

    /// Returns `true` for leaf nodes.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }
}
