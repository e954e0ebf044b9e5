//! Content-addressed cache keys.
//!
//! A content key is `<namespace>:<fnv1a-64 of canonical JSON>`. Object keys
//! are sorted recursively before hashing, so inputs that differ only in
//! field order map to the same key. The hash is fixed-width and stable across
//! processes and languages.

use serde::Serialize;
use serde_json::Value;

use crate::error::{CacheError, CacheResult};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a.
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Builds a content-addressed key for `input` under `namespace`.
///
/// ```
/// use serde_json::json;
/// use tagcache::content_key;
///
/// let a = content_key("search", &json!({"q": "dominion", "page": 2})).unwrap();
/// let b = content_key("search", &json!({"page": 2, "q": "dominion"})).unwrap();
/// assert_eq!(a, b);
/// ```
pub fn content_key<T: Serialize + ?Sized>(namespace: &str, input: &T) -> CacheResult<String> {
    let value =
        serde_json::to_value(input).map_err(|e| CacheError::serialization(namespace, e))?;
    let mut canonical = String::new();
    write_canonical(&value, &mut canonical);
    Ok(format!("{namespace}:{:016x}", fnv1a_64(canonical.as_bytes())))
}

/// Writes `value` as compact JSON with object keys in sorted order.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // String keys always serialize.
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
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
    fn test_fnv1a_reference_vectors() {
        assert_eq!(fnv1a_64(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a_64(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a_64(b"foobar"), 0x85944171f73967e8);
    }

    #[test]
    fn test_field_order_does_not_matter() {
        let a = content_key(
            "forum",
            &json!({"category": 3, "filters": {"pinned": true, "author": "x"}}),
        )
        .unwrap();
        let b = content_key(
            "forum",
            &json!({"filters": {"author": "x", "pinned": true}, "category": 3}),
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_array_order_matters() {
        let a = content_key("k", &json!([1, 2])).unwrap();
        let b = content_key("k", &json!([2, 1])).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_format() {
        let key = content_key("search", &json!({"q": "x"})).unwrap();
        let (namespace, hash) = key.split_once(':').unwrap();
        assert_eq!(namespace, "search");
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_canonical_form() {
        let mut out = String::new();
        write_canonical(&json!({"b": [1, {"d": null, "c": "s"}], "a": 1.5}), &mut out);
        assert_eq!(out, r#"{"a":1.5,"b":[1,{"c":"s","d":null}]}"#);
    }

    #[test]
    fn test_structs_hash_like_equivalent_json() {
        #[derive(Serialize)]
        struct Query {
            page: u32,
            q: &'static str,
        }
        let from_struct = content_key("search", &Query { page: 2, q: "x" }).unwrap();
        let from_json = content_key("search", &json!({"q": "x", "page": 2})).unwrap();
        assert_eq!(from_struct, from_json);
    }
}
