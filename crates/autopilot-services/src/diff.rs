//! Three-way diff helpers (§4.3, §9 "Three-way diff").
//!
//! Vault's remote representations carry many server-defaulted fields the
//! operator never declared. Comparing the full remote object against the
//! declared one would report spurious drift on every apply, so every diff
//! in this crate first restricts the remote side to the *declared* field
//! subset, then compares what's left.

use serde_json::{Map, Value};

/// Field names present in `declared` whose value differs from (or is
/// missing from) `remote`. Nested objects are compared recursively,
/// restricted the same way at every level.
pub fn subset_diff(declared: &Map<String, Value>, remote: &Map<String, Value>) -> Vec<String> {
    let mut out = Vec::new();
    for (key, declared_value) in declared {
        match remote.get(key) {
            None => out.push(key.clone()),
            Some(remote_value) => {
                if !values_match(declared_value, remote_value) {
                    out.push(key.clone());
                }
            }
        }
    }
    out
}

fn values_match(declared: &Value, remote: &Value) -> bool {
    match (declared, remote) {
        (Value::Object(d), Value::Object(r)) => subset_diff(d, r).is_empty(),
        _ => declared == remote,
    }
}

/// Order-insensitive deep equality, used where declared collections (e.g.
/// password policy rules) may be reordered by the remote store without that
/// counting as drift.
pub fn unordered_eq<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut remaining: Vec<&T> = b.iter().collect();
    for item in a {
        match remaining.iter().position(|candidate| *candidate == item) {
            Some(idx) => {
                remaining.remove(idx);
            }
            None => return false,
        }
    }
    true
}
