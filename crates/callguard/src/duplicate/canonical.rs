//! Canonical argument serialization.
//!
//! Two argument mappings that differ only in key order must compare equal.
//! [`canonical_string`] writes keys in sorted order at every nesting level,
//! independent of how `serde_json::Map` happens to be ordered in the current
//! build (the `preserve_order` feature flips it to insertion order).

use serde_json::{Map, Value};

/// Return a copy of `value` with every object's keys sorted, recursively.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = Map::new();
            for (k, v) in entries {
                out.insert(k.clone(), canonicalize(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Serialize `value` compactly with sorted object keys.
///
/// Arrays keep their order; only mapping keys are normalized.
pub fn canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap();
        assert_eq!(canonical_string(&a), canonical_string(&b));
        assert_eq!(canonical_string(&a), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn nested_objects_are_sorted() {
        let v = json!({"z": {"y": 1, "x": [ {"d": 1, "c": 2} ]}, "a": null});
        assert_eq!(
            canonical_string(&v),
            r#"{"a":null,"z":{"x":[{"c":2,"d":1}],"y":1}}"#
        );
    }

    #[test]
    fn array_order_is_significant() {
        assert_ne!(
            canonical_string(&json!([1, 2])),
            canonical_string(&json!([2, 1]))
        );
    }

    #[test]
    fn empty_and_scalar_inputs() {
        assert_eq!(canonical_string(&json!({})), "{}");
        assert_eq!(canonical_string(&Value::Null), "null");
        assert_eq!(canonical_string(&json!("a\"b")), r#""a\"b""#);
    }

    #[test]
    fn canonicalize_matches_canonical_string() {
        let v = json!({"b": {"d": 1, "c": 2}, "a": [3]});
        assert_eq!(canonicalize(&v).to_string(), canonical_string(&v));
    }
}
