//! Key store: string key to JSON value.
//!
//! The store is the only place values physically live. Entries are created
//! or overwritten by `insert` and released by `remove`; nothing expires on
//! its own. The store lives as long as the [`StateContext`](crate::StateContext)
//! that owns it.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;

use crate::codec;
use crate::error::StateError;

/// A shared map from key to [`Value`].
///
/// Cloning yields another handle to the same entries.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    entries: Arc<DashMap<String, Value>>,
}

impl KeyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Store `value` under `key`, returning the value it replaced.
    ///
    /// The swap is a single map operation, so the returned previous value is
    /// exactly what this call overwrote.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        trace!(key, "store insert");
        self.entries.insert(key, value)
    }

    /// Remove the entry for `key`, returning it if present.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    /// Returns `true` if `key` has a stored value.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns every key currently stored, in no particular order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode the value under `key` as `T`.
    ///
    /// Returns `Ok(None)` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Decode`] if the stored value is not a `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StateError> {
        self.get(key).map(codec::decode).transpose()
    }

    /// Encode `value` and store it under `key`, returning the replaced value.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Encode`] if `value` cannot be encoded; the store
    /// is left untouched in that case.
    pub fn set_as<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Option<Value>, StateError> {
        let encoded = codec::encode(value)?;
        Ok(self.insert(key, encoded))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_missing_key_is_none() {
        let store = KeyStore::new();
        assert_eq!(store.get("nope"), None);
        assert!(!store.contains_key("nope"));
    }

    #[test]
    fn test_insert_returns_previous() {
        let store = KeyStore::new();
        assert_eq!(store.insert("k", json!(1)), None);
        assert_eq!(store.insert("k", json!(2)), Some(json!(1)));
        assert_eq!(store.get("k"), Some(json!(2)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove() {
        let store = KeyStore::new();
        store.insert("k", json!("v"));
        assert_eq!(store.remove("k"), Some(json!("v")));
        assert_eq!(store.remove("k"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_typed_helpers() {
        let store = KeyStore::new();
        store.set_as("pos", &[1.0, 2.0]).unwrap();
        let pos: Option<Vec<f64>> = store.get_as("pos").unwrap();
        assert_eq!(pos, Some(vec![1.0, 2.0]));
        let missing: Option<u32> = store.get_as("other").unwrap();
        assert_eq!(missing, None);
        assert!(store.get_as::<String>("pos").is_err());
    }
}
