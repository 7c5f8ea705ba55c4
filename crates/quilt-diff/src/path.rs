//! Dotted-path addressing into JSON-shaped values.
//!
//! A path is a dotted string of key segments; `"."` denotes the root. Array
//! elements are addressed by stringified index. These helpers are the only
//! place path syntax is interpreted.

use serde_json::{Map, Value};
use std::cmp::Ordering;

/// The root path.
pub const ROOT: &str = ".";

/// Join a parent path with a child key.
pub fn join(parent: &str, key: &str) -> String {
    if parent == ROOT {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// Split a path into its segments. The root has none.
pub fn segments(path: &str) -> Vec<&str> {
    if path == ROOT {
        Vec::new()
    } else {
        path.split('.').collect()
    }
}

/// Returns `true` if `ancestor` is a strict ancestor of `descendant`.
///
/// The root is an ancestor of every other path; no path is its own ancestor.
pub fn is_ancestor(ancestor: &str, descendant: &str) -> bool {
    if ancestor == descendant {
        return false;
    }
    if ancestor == ROOT {
        return true;
    }
    descendant.len() > ancestor.len()
        && descendant.starts_with(ancestor)
        && descendant.as_bytes()[ancestor.len()] == b'.'
}

/// Segment-wise path ordering, comparing numeric segments numerically so
/// array indices sort `2 < 10`.
pub fn compare(a: &str, b: &str) -> Ordering {
    let a_segs = segments(a);
    let b_segs = segments(b);
    for (sa, sb) in a_segs.iter().zip(&b_segs) {
        let ord = match (sa.parse::<u64>(), sb.parse::<u64>()) {
            (Ok(na), Ok(nb)) => na.cmp(&nb),
            _ => sa.cmp(sb),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a_segs.len().cmp(&b_segs.len())
}

/// Read the value at `path`, or `None` if any segment is absent.
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for seg in segments(path) {
        current = match current {
            Value::Object(map) => map.get(seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `new` at `path`, creating missing intermediates as objects.
///
/// Array segments address elements in place; an index just past the end
/// appends, and a gap is padded with nulls. A primitive in an intermediate
/// position is replaced by an object. Setting the root replaces the whole
/// value.
pub fn set_path(value: &mut Value, path: &str, new: Value) {
    if path == ROOT {
        *value = new;
        return;
    }
    let segs = segments(path);
    let mut current = value;
    for seg in &segs[..segs.len() - 1] {
        current = descend(current, seg);
    }
    insert(current, segs[segs.len() - 1], new);
}

/// Remove the value at `path`. Absent paths are a no-op; unsetting the root
/// leaves `null`. Deleting the last child leaves the empty parent in place.
pub fn unset_path(value: &mut Value, path: &str) {
    if path == ROOT {
        *value = Value::Null;
        return;
    }
    let segs = segments(path);
    let mut current = value;
    for seg in &segs[..segs.len() - 1] {
        let next = match current {
            Value::Object(map) => map.get_mut(*seg),
            Value::Array(items) => match seg.parse::<usize>() {
                Ok(i) => items.get_mut(i),
                Err(_) => None,
            },
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return,
        }
    }
    match current {
        Value::Object(map) => {
            map.remove(segs[segs.len() - 1]);
        }
        Value::Array(items) => {
            if let Ok(i) = segs[segs.len() - 1].parse::<usize>() {
                if i < items.len() {
                    items.remove(i);
                }
            }
        }
        _ => {}
    }
}

/// Step into `seg`, normalizing the current position so the walk can
/// continue: in-range array indices pass through, anything else becomes an
/// object entry (created as null if absent).
fn descend<'a>(current: &'a mut Value, seg: &str) -> &'a mut Value {
    let array_index = match current {
        Value::Array(items) => match seg.parse::<usize>() {
            Ok(i) if i < items.len() => Some(i),
            _ => None,
        },
        _ => None,
    };
    if let Some(i) = array_index {
        return &mut current.as_array_mut().expect("checked array above")[i];
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    current
        .as_object_mut()
        .expect("normalized to object above")
        .entry(seg.to_string())
        .or_insert(Value::Null)
}

fn insert(parent: &mut Value, key: &str, new: Value) {
    if let Value::Array(items) = parent {
        if let Ok(i) = key.parse::<usize>() {
            while items.len() < i {
                items.push(Value::Null);
            }
            if i < items.len() {
                items[i] = new;
            } else {
                items.push(new);
            }
            return;
        }
    }
    if !parent.is_object() {
        *parent = Value::Object(Map::new());
    }
    parent
        .as_object_mut()
        .expect("normalized to object above")
        .insert(key.to_string(), new);
}
