//! # Config Fragment Primitives
//!
//! This module defines `Fragment`, the canonical in-memory representation of
//! a configuration fragment (an immutable mapping of named fields), together
//! with the low-level merge primitives every composition rule is built from.
//!
//! ## Merge primitives
//!
//! - **`shallow_merge`**: plain key-by-key merge, override wins.
//! - **`merge_map_key`**: shallow merge of one map-valued reserved field
//!   (`handlers`, `attributes`, `operations`, `functions`, `vars`, `types`),
//!   override wins per entry.
//! - **`merge_list_key`**: concatenation of one list-valued reserved field
//!   with first-occurrence de-duplication (`mixins`), optionally restricted
//!   to string entries (`middlewares`, `backends`: non-string entries are
//!   never de-duplicated, they are always appended).
//! - **`merge_hooks`**: merge-by-key with list concatenation; hook lists are
//!   never overwritten, only appended to.
//! - **`populate_data`**: recursive deep merge used for the shared
//!   description object the orchestrator threads through `describe` calls.
//!
//! All primitives are pure: they never touch external state, and identical
//! inputs always produce structurally identical output.

use serde_json::Value;

/// A configuration fragment: named fields with string, number, boolean,
/// nested mapping or ordered list values.
pub type Fragment = serde_json::Map<String, Value>;

/// Build a fragment from a JSON value, treating anything but an object as
/// an empty fragment.
pub fn as_fragment(value: &Value) -> Fragment {
    match value {
        Value::Object(map) => map.clone(),
        _ => Fragment::new(),
    }
}

/// Shallow-merge `override_frag` over `base`: every key of the override
/// wins, keys only present in the base survive.
pub fn shallow_merge(base: &Fragment, override_frag: &Fragment) -> Fragment {
    let mut out = base.clone();
    for (key, value) in override_frag {
        out.insert(key.clone(), value.clone());
    }
    out
}

/// Merge one map-valued key of two fragments, override winning per entry.
///
/// Missing or non-object values on either side count as empty maps. The
/// result is only inserted into `target` when at least one side carried
/// the key.
pub fn merge_map_key(target: &mut Fragment, a: &Fragment, b: &Fragment, key: &str) {
    if !a.contains_key(key) && !b.contains_key(key) {
        return;
    }
    let mut merged = a.get(key).map(as_fragment).unwrap_or_default();
    if let Some(Value::Object(bmap)) = b.get(key) {
        for (k, v) in bmap {
            merged.insert(k.clone(), v.clone());
        }
    }
    target.insert(key.to_string(), Value::Object(merged));
}

/// Concatenate one list-valued key of two fragments with first-occurrence
/// de-duplication.
///
/// With `dedup_strings_only` set, only string entries are de-duplicated;
/// non-string entries (inline objects) are always appended, in order.
pub fn merge_list_key(
    target: &mut Fragment,
    a: &Fragment,
    b: &Fragment,
    key: &str,
    dedup_strings_only: bool,
) {
    if !a.contains_key(key) && !b.contains_key(key) {
        return;
    }
    let items = list_of(a, key)
        .into_iter()
        .chain(list_of(b, key))
        .collect::<Vec<_>>();
    let mut out: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        let dedup = !dedup_strings_only || item.is_string();
        if dedup && out.contains(&item) {
            continue;
        }
        out.push(item);
    }
    target.insert(key.to_string(), Value::Array(out));
}

/// Merge the `hooks` key of two fragments: per hook phase key, the
/// override's list is appended to the base's list. Hook lists are never
/// replaced.
pub fn merge_hooks_key(target: &mut Fragment, a: &Fragment, b: &Fragment) {
    if !a.contains_key("hooks") && !b.contains_key("hooks") {
        return;
    }
    let mut merged = a.get("hooks").map(as_fragment).unwrap_or_default();
    if let Some(Value::Object(bmap)) = b.get("hooks") {
        for (phase, additions) in bmap {
            let entry = merged
                .entry(phase.clone())
                .or_insert(Value::Array(Vec::new()));
            if !entry.is_array() {
                // A scalar hook value is promoted to a single-entry list.
                let scalar = std::mem::take(entry);
                *entry = Value::Array(vec![scalar]);
            }
            if let Value::Array(existing) = entry {
                match additions {
                    Value::Array(list) => existing.extend(list.iter().cloned()),
                    other => existing.push(other.clone()),
                }
            }
        }
    }
    target.insert("hooks".to_string(), Value::Object(merged));
}

/// Recursively merge `source` into `target`.
///
/// Objects merge key by key with recursive descent; lists and scalars from
/// the source replace the target value. This is the semantics of the shared
/// description object: later describers refine earlier ones.
pub fn populate_data(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(tmap), Value::Object(smap)) => {
            for (key, svalue) in smap {
                match tmap.get_mut(key) {
                    Some(tvalue) if tvalue.is_object() && svalue.is_object() => {
                        populate_data(tvalue, svalue);
                    }
                    _ => {
                        tmap.insert(key.clone(), svalue.clone());
                    }
                }
            }
        }
        (target, source) => *target = source.clone(),
    }
}

fn list_of(frag: &Fragment, key: &str) -> Vec<Value> {
    match frag.get(key) {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

/// Read a string-valued field.
pub fn get_str<'a>(frag: &'a Fragment, key: &str) -> Option<&'a str> {
    frag.get(key).and_then(Value::as_str)
}

/// Read a map-valued field, `None` when absent or not a map.
pub fn get_map<'a>(frag: &'a Fragment, key: &str) -> Option<&'a Fragment> {
    frag.get(key).and_then(Value::as_object)
}
