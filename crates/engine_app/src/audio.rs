//! Audio readiness gate.
//!
//! Audio may only start after the user has interacted with the page. The
//! gate listens for the first pointer, keyboard or touch event and flips
//! `audio.ready` once; everything else only reads it.

use std::sync::Arc;

use engine_state::channels;
use engine_state::{ObservableValue, StateContext, Subscription};
use parking_lot::Mutex;
use tracing::{info, warn};

/// Flips `audio.ready` on the first user interaction and then stops
/// listening.
#[derive(Debug)]
pub struct AudioGate {
    ready: ObservableValue<bool>,
    listeners: Arc<Mutex<Vec<Subscription>>>,
}

impl AudioGate {
    /// Start listening on every interaction channel of `state`.
    #[must_use]
    pub fn new(state: &StateContext) -> Self {
        let ready = state.observable(channels::AUDIO_READY, false);
        let listeners: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));

        for channel in channels::USER_INTERACTION {
            let flag = ready.clone();
            let pending = Arc::downgrade(&listeners);
            let subscription = state.bus().subscribe(channel, move |_| {
                if let Err(err) = flag.set(true) {
                    warn!(%err, "could not mark audio ready");
                    return;
                }
                info!(channel, "audio unlocked by user interaction");
                if let Some(pending) = pending.upgrade() {
                    for mut listener in pending.lock().drain(..) {
                        listener.unsubscribe();
                    }
                }
            });
            listeners.lock().push(subscription);
        }

        Self { ready, listeners }
    }

    /// Whether a user interaction has been seen.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.get()
    }

    /// Call `callback` once audio becomes available.
    pub fn on_ready<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.ready.on_changed(move |change| {
            if change.next_value {
                callback();
            }
        })
    }

    /// Whether the gate is still waiting for an interaction.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        !self.listeners.lock().is_empty()
    }
}

impl Drop for AudioGate {
    fn drop(&mut self) {
        for mut listener in self.listeners.lock().drain(..) {
            listener.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    #[test]
    fn test_first_interaction_unlocks_once() {
        let state = StateContext::new();
        let gate = AudioGate::new(&state);
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let _sub = gate.on_ready(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert!(!gate.is_ready());
        assert!(gate.is_listening());

        state.bus().publish(channels::KEY_DOWN, json!({ "key": "Space" }));
        state.bus().publish(channels::POINTER_DOWN, json!({}));

        assert!(gate.is_ready());
        assert!(!gate.is_listening());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        for channel in channels::USER_INTERACTION {
            assert_eq!(state.bus().subscriber_count(channel), 0);
        }
    }

    #[test]
    fn test_unrelated_channels_do_not_unlock() {
        let state = StateContext::new();
        let gate = AudioGate::new(&state);
        state.bus().publish(channels::FRAME_INDEX, json!(1));
        assert!(!gate.is_ready());
    }
}
