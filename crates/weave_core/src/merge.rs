//! Deep merge and path lookup over JSON state
//!
//! Merge rule: when both the existing value and the incoming value are JSON
//! objects they are merged key by key, recursively. Every other pairing
//! (arrays, scalars, `null`, object over non-object) replaces the existing
//! value wholesale. Arrays are never concatenated or merged element-wise.

use serde_json::{Map, Value};

/// Merge `source` over `target`, returning a new map
///
/// Neither input is modified.
pub fn deep_merge(target: &Map<String, Value>, source: &Map<String, Value>) -> Map<String, Value> {
    let mut result = target.clone();
    merge_into(&mut result, source);
    result
}

/// Merge `source` into `target` in place
pub fn merge_into(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, incoming) in source {
        let slot = target.entry(key.clone()).or_insert(Value::Null);
        match (slot, incoming) {
            (Value::Object(existing), Value::Object(patch)) => merge_into(existing, patch),
            (slot, incoming) => *slot = incoming.clone(),
        }
    }
}

/// Look up a dot-separated path such as `todos.1.title`
///
/// Objects are walked by key and arrays by numeric index. Returns `None` for
/// an empty path or as soon as a segment is missing.
pub fn value_at<'a>(state: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }

    let mut segments = path.split('.');
    let mut current = state.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
