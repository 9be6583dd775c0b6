//! Event bus: named channels with synchronous, ordered delivery.
//!
//! A channel's subscriber list is created on first subscription and dropped
//! when its last subscriber leaves. [`EventBus::publish`] delivers to a
//! snapshot of the list taken when the call starts, so callbacks may publish,
//! subscribe or unsubscribe without deadlocking the dispatch; such changes
//! only affect later publishes.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{trace, warn};

use crate::codec;
use crate::error::StateError;
use crate::subscription::Subscription;

/// A subscriber callback. Receives the published value by reference.
pub type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

struct Subscriber {
    id: u64,
    callback: Callback,
}

#[derive(Default)]
struct Channels {
    table: DashMap<String, Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl Channels {
    fn remove(&self, channel: &str, id: u64) {
        if let Some(mut subscribers) = self.table.get_mut(channel) {
            subscribers.retain(|s| s.id != id);
        }
        self.table
            .remove_if(channel, |_, subscribers| subscribers.is_empty());
    }
}

/// Publish/subscribe over named channels.
///
/// Cloning yields another handle to the same channel table.
#[derive(Clone, Default)]
pub struct EventBus {
    channels: Arc<Channels>,
}

impl EventBus {
    /// Create a bus with no channels.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `value` to every current subscriber of `channel`, in
    /// subscription order, and hand it back.
    pub fn publish(&self, channel: &str, value: Value) -> Value {
        let callbacks: Vec<Callback> = match self.channels.table.get(channel) {
            Some(subscribers) => subscribers.iter().map(|s| Arc::clone(&s.callback)).collect(),
            None => return value,
        };

        trace!(channel, subscribers = callbacks.len(), "publish");
        for callback in &callbacks {
            callback(&value);
        }
        value
    }

    /// Encode `event` and publish it on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Encode`] if the event cannot be encoded; nothing
    /// is delivered in that case.
    pub fn publish_event<T: Serialize>(&self, channel: &str, event: &T) -> Result<(), StateError> {
        let value = codec::encode(event)?;
        self.publish(channel, value);
        Ok(())
    }

    /// Register `callback` on `channel`.
    ///
    /// The returned [`Subscription`] removes exactly this registration.
    pub fn subscribe<F>(&self, channel: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let channel = channel.into();
        let id = self.channels.next_id.fetch_add(1, Ordering::Relaxed);
        self.channels
            .table
            .entry(channel.clone())
            .or_default()
            .push(Subscriber {
                id,
                callback: Arc::new(callback),
            });
        trace!(channel, id, "subscribe");

        let channels = Arc::downgrade(&self.channels);
        Subscription::new(move || {
            if let Some(channels) = channels.upgrade() {
                channels.remove(&channel, id);
            }
        })
    }

    /// Register a typed callback on `channel`.
    ///
    /// Payloads that do not decode as `T` are skipped and logged.
    pub fn subscribe_event<T, F>(&self, channel: impl Into<String>, callback: F) -> Subscription
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let channel = channel.into();
        let name = channel.clone();
        self.subscribe(channel, move |value| {
            match codec::decode::<T>(value.clone()) {
                Ok(event) => callback(event),
                Err(err) => warn!(channel = name, %err, "dropping undecodable event"),
            }
        })
    }

    /// Returns the number of subscribers currently on `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels.table.get(channel).map_or(0, |s| s.len())
    }

    /// Returns the number of channels with at least one subscriber.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.table.len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("channels", &self.channel_count())
            .finish()
    }
}
