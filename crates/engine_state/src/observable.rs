//! Observable values: one key in the store plus its change channel.
//!
//! An [`ObservableValue`] publishes a [`Change`] on `<key>.changed` every
//! time [`set`](ObservableValue::set) stores a value that differs from the
//! one it replaces. Equality is JSON value equality, so two structurally
//! equal values never produce a notification.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{trace, warn};

use crate::StateContext;
use crate::channels;
use crate::codec;
use crate::error::StateError;
use crate::messages::Change;
use crate::subscription::Subscription;

/// A typed, keyed value with change notification.
///
/// Several `ObservableValue`s built over the same key in the same context
/// share storage and listeners.
pub struct ObservableValue<T> {
    key: String,
    channel: String,
    default: T,
    state: StateContext,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ObservableValue<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Bind to `key` in `state`. Nothing is written until the first `set`.
    #[must_use]
    pub fn new(state: &StateContext, key: impl Into<String>, default: T) -> Self {
        let key = key.into();
        let channel = channels::changed(&key);
        Self {
            key,
            channel,
            default,
            state: state.clone(),
            _marker: PhantomData,
        }
    }

    /// The store key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The channel change events are published on.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The value returned while nothing is stored.
    #[must_use]
    pub fn default_value(&self) -> &T {
        &self.default
    }

    /// Returns `true` if a value has been stored under the key.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.state.store().contains_key(&self.key)
    }

    /// Returns the stored value, or the default if nothing is stored.
    ///
    /// A stored value that no longer decodes as `T` also yields the default.
    /// Reading never writes the default into the store.
    #[must_use]
    pub fn get(&self) -> T {
        match self.state.store().get_as::<T>(&self.key) {
            Ok(Some(value)) => value,
            Ok(None) => self.default.clone(),
            Err(err) => {
                warn!(key = self.key, %err, "stored value does not decode, using default");
                self.default.clone()
            }
        }
    }

    /// Store `value` and publish a [`Change`] if it differs from the stored one.
    ///
    /// Returns the value that was passed in.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Encode`] if `value` cannot be encoded; the store
    /// and listeners are untouched in that case.
    pub fn set(&self, value: T) -> Result<T, StateError> {
        let next = codec::encode(&value)?;
        let previous = self.state.store().insert(self.key.clone(), next.clone());
        if previous.as_ref() == Some(&next) {
            return Ok(value);
        }

        trace!(key = self.key, "value changed");
        let change = Change {
            previous_value: previous,
            next_value: next,
        };
        self.state.bus().publish(&self.channel, codec::encode(&change)?);
        Ok(value)
    }

    /// Read, transform and write back. Not atomic: another writer may run
    /// between the read and the write.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Encode`] if the new value cannot be encoded.
    pub fn update(&self, f: impl FnOnce(T) -> T) -> Result<T, StateError> {
        self.set(f(self.get()))
    }

    /// Call `callback` with every future [`Change`] of this value.
    pub fn on_changed<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Change<T>) + Send + Sync + 'static,
    {
        self.state.bus().subscribe_event::<Change<T>, _>(self.channel.clone(), callback)
    }
}

impl<T: Clone> Clone for ObservableValue<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            channel: self.channel.clone(),
            default: self.default.clone(),
            state: self.state.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableValue")
            .field("key", &self.key)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}
