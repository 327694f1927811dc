//! Canonical JSON encoding for signed payloads.
//!
//! Canonical form: object keys in lexicographic order at every depth,
//! compact separators, no whitespace. Signer and verifier both go through
//! [`value_to_canonical_bytes`], the signer starting from a typed value and
//! the verifier from the JSON it received, so neither side depends on
//! struct declaration order or on how `serde_json::Map` is backed.

use serde::Serialize;
use serde_json::{Map, Value};

/// Encodes a typed value canonically.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let value = serde_json::to_value(value)?;
    value_to_canonical_bytes(&value)
}

/// Encodes an already-parsed JSON value canonically.
pub fn value_to_canonical_bytes(value: &Value) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&sorted(value))
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::with_capacity(map.len());
            for key in keys {
                out.insert(key.clone(), sorted(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_and_compact() {
        let v = json!({"b": 1, "a": {"z": [3, {"y": 1, "x": 2}], "c": null}});
        let bytes = value_to_canonical_bytes(&v).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"a":{"c":null,"z":[3,{"x":2,"y":1}]},"b":1}"#
        );
    }

    #[test]
    fn typed_and_parsed_forms_agree() {
        #[derive(Serialize)]
        struct Out {
            zeta: &'static str,
            alpha: i64,
        }
        let typed = to_canonical_bytes(&Out { zeta: "z", alpha: -4 }).unwrap();
        let reparsed: Value = serde_json::from_slice(&typed).unwrap();
        assert_eq!(typed, value_to_canonical_bytes(&reparsed).unwrap());
    }
}
