//! Canonical JSON encoding.
//!
//! Every hash in Quilt is computed over the canonical encoding of a value:
//! compact UTF-8 JSON with object keys in sorted order. Existing databases
//! depend on this rule bit-exactly, so it lives in one place.

use serde::Serialize;

use crate::error::TypeError;
use crate::hash::ObjectHash;

/// Serialize a value to its canonical JSON bytes.
///
/// The value is first converted to a `serde_json::Value`, whose object
/// representation is a `BTreeMap`, so keys come out sorted at every nesting
/// level regardless of the input type's field order. The final encoding is
/// compact (no extraneous whitespace).
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, TypeError> {
    let normalized =
        serde_json::to_value(value).map_err(|e| TypeError::Serialization(e.to_string()))?;
    serde_json::to_vec(&normalized).map_err(|e| TypeError::Serialization(e.to_string()))
}

/// Hash a value's canonical encoding.
pub fn hash_value<T: Serialize>(value: &T) -> Result<ObjectHash, TypeError> {
    Ok(ObjectHash::from_bytes(&canonical_bytes(value)?))
}
