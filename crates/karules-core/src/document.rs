// Karules Document Assembly
// Canonical key ordering for reproducible, diffable output

use serde_json::{Map, Value};

use crate::group::Ruleset;

/// Recursively sort every object's keys; array element order is preserved.
///
/// Purely cosmetic: identical logical input serializes to identical bytes,
/// which makes the output diffable and the compile idempotent.
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, canonicalize(value));
            }
            Value::Object(sorted)
        }
        other => other,
    }
}

impl Ruleset {
    /// Produce the final rules array: groups in declaration order, every
    /// object's keys canonically sorted.
    pub fn compile(&self) -> serde_json::Result<Value> {
        Ok(canonicalize(serde_json::to_value(self.groups())?))
    }
}
