//! # engine_state
//!
//! Reactive state layer for the engine core.
//!
//! This crate provides:
//!
//! - [`store`]: the key store, the only place values physically live.
//! - [`bus`]: named-channel publish/subscribe with synchronous delivery.
//! - [`observable`]: a keyed value that publishes a before/after pair on change.
//! - [`subscription`]: the cancellation handle returned by every registration.
//! - [`channels`]: channel and key naming.
//! - [`messages`]: event payloads shared across crates.
//! - [`codec`]: JSON encoding helpers for typed values.
//! - [`error`]: state-layer error types.
//!
//! Everything hangs off a [`StateContext`]; two contexts share nothing.

pub mod bus;
pub mod channels;
pub mod codec;
pub mod error;
pub mod messages;
pub mod observable;
pub mod store;
pub mod subscription;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use bus::EventBus;
pub use codec::{decode, encode};
pub use error::StateError;
pub use messages::Change;
pub use observable::ObservableValue;
pub use store::KeyStore;
pub use subscription::Subscription;

/// Owns one [`KeyStore`] and one [`EventBus`].
///
/// Cloning is cheap and yields a handle to the same store and bus.
#[derive(Debug, Clone, Default)]
pub struct StateContext {
    store: KeyStore,
    bus: EventBus,
}

impl StateContext {
    /// Create a context with an empty store and no channels.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the key store.
    #[must_use]
    pub fn store(&self) -> &KeyStore {
        &self.store
    }

    /// Returns the event bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Build an [`ObservableValue`] over `key` in this context.
    #[must_use]
    pub fn observable<T>(&self, key: impl Into<String>, default: T) -> ObservableValue<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        ObservableValue::new(self, key, default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_are_isolated() {
        let a = StateContext::new();
        let b = StateContext::new();
        a.observable("score", 0u32).set(10).unwrap();
        assert_eq!(b.observable("score", 0u32).get(), 0);
        assert_eq!(a.observable("score", 0u32).get(), 10);
    }

    #[test]
    fn test_clone_shares_state() {
        let a = StateContext::new();
        let b = a.clone();
        a.store().insert("k", serde_json::json!(1));
        assert_eq!(b.store().get("k"), Some(serde_json::json!(1)));
    }
}
