//! Canonical encoding: a stable serialization used everywhere a hash or
//! nonce is computed, so that those values are independent of field
//! insertion order.
//!
//! Object keys are sorted lexicographically at every depth, arrays are left
//! in order, numbers use `serde_json`'s shortest round-trip form, strings
//! are UTF-8. The trick that makes this free: `serde_json::Value`'s object
//! type is a `BTreeMap` whenever the `preserve_order` feature is off (it is,
//! in this workspace), so round-tripping any `Serialize` value through
//! `serde_json::Value` and back out to bytes already sorts every map.

use covalue_core::CovalueError;
use serde::Serialize;

/// Serialize `value` to its canonical byte representation.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CovalueError> {
    let as_value = serde_json::to_value(value)
        .map_err(|e| CovalueError::serialization(format!("canonicalize: {e}")))?;
    serde_json::to_vec(&as_value)
        .map_err(|e| CovalueError::serialization(format!("canonicalize: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_canonical_bytes() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert_eq!(canonical_bytes(&a).unwrap(), canonical_bytes(&b).unwrap());
    }

    #[test]
    fn nested_key_order_is_normalized() {
        let a = json!({"outer": {"x": 1, "y": 2}, "z": 3});
        let b = json!({"z": 3, "outer": {"y": 2, "x": 1}});
        assert_eq!(canonical_bytes(&a).unwrap(), canonical_bytes(&b).unwrap());
    }

    #[test]
    fn array_order_is_preserved() {
        let a = json!([1, 2, 3]);
        let b = json!([3, 2, 1]);
        assert_ne!(canonical_bytes(&a).unwrap(), canonical_bytes(&b).unwrap());
    }
}
