//! Facts tree primitives.
//!
//! A facts tree is an ordered JSON object. Ordering comes from the
//! `preserve_order` feature of `serde_json`, so sequences and mappings keep
//! first-seen order all the way from parsing to rendering.

use serde_json::{Map, Value};

use super::table::PatternTable;

/// An ordered mapping from field name to scalar, nested tree or sequence.
pub type Facts = Map<String, Value>;

/// Join a dotted schema path with a child key.
pub fn join_path(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", base, key)
    }
}

/// Path of `full` relative to `base`, or `None` when `full` is not below it.
pub fn relative_path<'a>(base: &str, full: &'a str) -> Option<&'a str> {
    if base.is_empty() {
        return Some(full);
    }
    full.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('.'))
}

/// Look up a dotted path inside a tree. Sequences are not traversed.
pub fn get_path<'a>(facts: &'a Facts, dotted: &str) -> Option<&'a Value> {
    let mut segments = dotted.split('.');
    let first = segments.next()?;
    let mut current = facts.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Insert a value at a dotted path, creating intermediate objects.
pub fn set_path(facts: &mut Facts, dotted: &str, value: Value) {
    let mut segments: Vec<&str> = dotted.split('.').collect();
    let last = match segments.pop() {
        Some(last) => last,
        None => return,
    };
    let mut current = facts;
    for segment in segments {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry.as_object_mut() {
            Some(map) => map,
            None => return,
        };
    }
    current.insert(last.to_string(), value);
}

/// Canonical text form of a scalar, used for natural-key matching.
///
/// Numbers and numeric strings share a representation so that a key typed
/// as `10` in desired config matches `"10"` parsed from device text.
pub fn scalar_repr(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Structural equality that tolerates number/string representation drift
/// and ignores key order inside mappings.
pub fn values_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            let x: Vec<_> = x.iter().filter(|(_, v)| !v.is_null()).collect();
            let y_len = y.values().filter(|v| !v.is_null()).count();
            x.len() == y_len
                && x.iter()
                    .all(|(k, v)| y.get(k.as_str()).map_or(false, |w| values_eq(v, w)))
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(v, w)| values_eq(v, w))
        }
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            scalar_repr(a) == scalar_repr(b)
        }
        _ => a == b,
    }
}

/// Recursively drop `null` entries and `null` sequence elements.
pub fn prune_nulls(facts: &Facts) -> Facts {
    let mut out = Map::new();
    for (key, value) in facts {
        if let Some(pruned) = prune_value(value) {
            out.insert(key.clone(), pruned);
        }
    }
    out
}

fn prune_value(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => Some(Value::Object(prune_nulls(map))),
        Value::Array(items) => Some(Value::Array(
            items.iter().filter_map(prune_value).collect(),
        )),
        other => Some(other.clone()),
    }
}

/// Merge `new` into `acc`.
///
/// Mappings merge recursively; sequences declared in the table merge
/// element-wise by natural key, appending elements with an unseen key;
/// any other value in `new` overwrites the one in `acc`.
pub fn merge_facts(acc: &mut Facts, new: Facts, path: &str, table: &PatternTable) {
    for (key, value) in new {
        let child = join_path(path, &key);
        match (acc.get_mut(&key), value) {
            (Some(Value::Array(existing)), Value::Array(items)) if table.is_sequence(&child) => {
                for item in items {
                    let Value::Object(element) = item else {
                        existing.push(item);
                        continue;
                    };
                    let key_of_new = table.key_of(&child, &element);
                    let slot = existing.iter_mut().find_map(|candidate| {
                        candidate
                            .as_object_mut()
                            .filter(|c| table.key_of(&child, c) == key_of_new)
                    });
                    match slot {
                        Some(target) => merge_facts(target, element, &child, table),
                        None => existing.push(Value::Object(element)),
                    }
                }
            }
            (Some(Value::Object(existing)), Value::Object(map)) => {
                merge_facts(existing, map, &child, table);
            }
            (_, value) => {
                acc.insert(key, value);
            }
        }
    }
}
