//! Deep merge of document fragments with a small patch vocabulary.
//!
//! Keys of a later fragment may carry a prefix that changes how they merge:
//!
//! | key | effect |
//! |---|---|
//! | `!name` | replace `name` wholesale; a `null` value deletes it |
//! | `^old: new` | move `old` under `new` (merging if `new` exists), drop `old` |
//! | `=name` | overwrite the array `name` position by position |
//!
//! Without a prefix objects merge recursively, arrays are unioned (earlier
//! elements first, duplicates dropped) and any other value overwrites.

use crate::document::Document;
use serde_json::{Map, Value};

pub const REPLACE_PREFIX: char = '!';
pub const RENAME_PREFIX: char = '^';
pub const POSITIONAL_PREFIX: char = '=';

/// Folds `fragments` left to right into one document. Each fragment sees the
/// merged state of every fragment before it.
pub fn merge_fragments<I>(fragments: I) -> Document
where
    I: IntoIterator<Item = Document>,
{
    let mut merged = Value::Object(Map::new());
    for (i, fragment) in fragments.into_iter().enumerate() {
        log::debug!("merging fragment {i}");
        merge_into(&mut merged, fragment);
    }
    merged
}

/// Merges `source` into `target` in place.
pub fn merge_into(target: &mut Value, source: Value) {
    match source {
        Value::Object(source_map) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            if let Value::Object(target_map) = target {
                for (key, value) in source_map {
                    merge_member(target_map, key, value);
                }
            }
        }
        Value::Array(source_items) => {
            if let Value::Array(target_items) = target {
                for item in source_items {
                    let item = fresh(item);
                    if !target_items.contains(&item) {
                        target_items.push(item);
                    }
                }
            } else {
                *target = fresh(Value::Array(source_items));
            }
        }
        other => *target = other,
    }
}

fn merge_member(target: &mut Map<String, Value>, key: String, value: Value) {
    if let Some(name) = key.strip_prefix(REPLACE_PREFIX) {
        if value.is_null() {
            target.shift_remove(name);
        } else {
            target.insert(name.to_string(), fresh(value));
        }
    } else if let Some(old) = key.strip_prefix(RENAME_PREFIX) {
        let Value::String(new) = value else {
            log::warn!("ignoring `{key}`: a rename needs the new key as a string");
            return;
        };
        if let Some(moved) = target.shift_remove(old) {
            let slot = target.entry(new).or_insert(Value::Null);
            merge_into(slot, moved);
        }
    } else if let Some(name) = key.strip_prefix(POSITIONAL_PREFIX) {
        match (target.get_mut(name), value) {
            (Some(Value::Array(existing)), Value::Array(items)) => {
                for (idx, item) in items.into_iter().enumerate() {
                    let item = fresh(item);
                    if idx < existing.len() {
                        existing[idx] = item;
                    } else {
                        existing.push(item);
                    }
                }
            }
            (_, value) => {
                target.insert(name.to_string(), fresh(value));
            }
        }
    } else {
        match target.get_mut(&key) {
            Some(slot) => merge_into(slot, value),
            None => {
                target.insert(key, fresh(value));
            }
        }
    }
}

/// Applies any directives nested inside a value that has nothing to merge with.
fn fresh(value: Value) -> Value {
    match value {
        Value::Object(_) | Value::Array(_) => {
            let mut out = Value::Null;
            if let Value::Array(items) = value {
                out = Value::Array(items.into_iter().map(fresh).collect());
            } else {
                merge_into(&mut out, value);
            }
            out
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_replace_prefix_overwrites_instead_of_union() {
        let merged = merge_fragments([
            json!({ "tags": ["a", "b"], "servers": ["x"] }),
            json!({ "!tags": ["c"], "servers": ["x", "y"] }),
        ]);
        assert_eq!(merged, json!({ "tags": ["c"], "servers": ["x", "y"] }));
    }

    #[test]
    fn test_replace_with_null_deletes() {
        let merged = merge_fragments([
            json!({ "a": 1, "b": 2 }),
            json!({ "!a": null }),
        ]);
        assert_eq!(merged, json!({ "b": 2 }));
    }

    #[test]
    fn test_rename_merges_under_new_key() {
        let merged = merge_fragments([
            json!({ "old": { "x": 1 }, "new": { "y": 2 } }),
            json!({ "^old": "new" }),
        ]);
        assert_eq!(merged, json!({ "new": { "y": 2, "x": 1 } }));
    }

    #[test]
    fn test_positional_array_overwrite() {
        let merged = merge_fragments([
            json!({ "list": [1, 2, 3] }),
            json!({ "=list": [9] }),
        ]);
        assert_eq!(merged, json!({ "list": [9, 2, 3] }));
    }

    #[test]
    fn test_directives_in_new_subtrees_are_applied() {
        let merged = merge_fragments([json!({}), json!({ "a": { "!b": 1 } })]);
        assert_eq!(merged, json!({ "a": { "b": 1 } }));
    }
}
