//! JSON codec helpers.
//!
//! Thin wrappers around `serde_json` for moving typed values in and out of
//! the store and the bus. Everything stored or published is a
//! [`serde_json::Value`].

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::StateError;

/// Encode a value to a JSON value.
///
/// # Errors
///
/// Returns [`StateError::Encode`] if serialisation fails (for example a map
/// with non-string keys).
pub fn encode<T: Serialize>(value: &T) -> Result<Value, StateError> {
    serde_json::to_value(value).map_err(StateError::Encode)
}

/// Decode a value from a JSON value.
///
/// # Errors
///
/// Returns [`StateError::Decode`] if the value does not match `T`.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, StateError> {
    serde_json::from_value(value).map_err(StateError::Decode)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Score {
        value: u32,
        name: String,
    }

    #[test]
    fn test_decode_wrong_shape() {
        let result: Result<Score, _> = decode(serde_json::json!([1, 2]));
        assert!(matches!(result, Err(StateError::Decode(_))));
    }

    #[test]
    fn test_encode_non_string_map_keys_fails() {
        let mut map = HashMap::new();
        map.insert((1, 2), "pair");
        assert!(matches!(encode(&map), Err(StateError::Encode(_))));
    }

    #[test]
    fn test_encode_produces_object() {
        let value = encode(&Score {
            value: 3,
            name: "p1".to_string(),
        })
        .unwrap();
        assert_eq!(value, serde_json::json!({ "value": 3, "name": "p1" }));
    }
}
