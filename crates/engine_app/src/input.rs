//! Gamepad input.
//!
//! [`InputPoller`] turns device snapshots into bus events; [`Axis`] and
//! [`Button`] turn those events back into observable values with edge
//! listeners.

use std::fmt;
use std::sync::Arc;

use engine_state::channels;
use engine_state::messages::{AxisEvent, ButtonEvent, GamepadEvent};
use engine_state::{EventBus, ObservableValue, StateContext, StateError, Subscription};
use futures::future;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::frame::FrameLoop;

/// The state of one device at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GamepadSnapshot {
    /// Pressed state per button index.
    pub buttons: Vec<bool>,
    /// Position per axis index, nominally in `-1.0..=1.0`.
    pub axes: Vec<f64>,
}

/// Something that can report the state of every gamepad slot.
///
/// `None` marks an empty slot.
pub trait GamepadSource: Send {
    /// Current state of every slot, indexed by gamepad number.
    fn poll(&mut self) -> Vec<Option<GamepadSnapshot>>;
}

/// Diffs successive snapshots and publishes what changed.
pub struct InputPoller<S> {
    source: S,
    previous: Vec<Option<GamepadSnapshot>>,
    bus: EventBus,
}

impl<S: GamepadSource> InputPoller<S> {
    /// Publish on the bus of `state`. The first poll treats every slot as
    /// previously empty.
    #[must_use]
    pub fn new(state: &StateContext, source: S) -> Self {
        Self {
            source,
            previous: Vec::new(),
            bus: state.bus().clone(),
        }
    }

    /// The wrapped source.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Read the source once and publish one event per difference from the
    /// previous read. Returns the number of events published.
    ///
    /// A slot that becomes occupied publishes `connected` and is then diffed
    /// against an all-released, all-zero pad. A slot that empties is first
    /// diffed back to that pad, so held buttons are released and moved axes
    /// return to zero, and then publishes `disconnected`. Buttons and axes
    /// missing from a shorter snapshot count as released and zero.
    ///
    /// # Errors
    ///
    /// Returns an error if an event cannot be encoded.
    pub fn poll(&mut self) -> Result<usize, StateError> {
        let current = self.source.poll();
        let slots = current.len().max(self.previous.len());
        let neutral = GamepadSnapshot::default();
        let mut published = 0;

        for gamepad in 0..slots {
            let before = self.previous.get(gamepad).and_then(Option::as_ref);
            let after = current.get(gamepad).and_then(Option::as_ref);

            match (before, after) {
                (None, None) => {}
                (Some(before), None) => {
                    published += self.diff(gamepad, before, &neutral)?;
                    debug!(gamepad, "gamepad disconnected");
                    self.bus
                        .publish_event(channels::GAMEPAD_DISCONNECTED, &GamepadEvent { gamepad })?;
                    published += 1;
                }
                (None, Some(after)) => {
                    debug!(gamepad, "gamepad connected");
                    self.bus
                        .publish_event(channels::GAMEPAD_CONNECTED, &GamepadEvent { gamepad })?;
                    published += 1;
                    published += self.diff(gamepad, &neutral, after)?;
                }
                (Some(before), Some(after)) => published += self.diff(gamepad, before, after)?,
            }
        }

        if published > 0 {
            trace!(published, "input events published");
        }
        self.previous = current;
        Ok(published)
    }

    fn diff(
        &self,
        gamepad: usize,
        before: &GamepadSnapshot,
        after: &GamepadSnapshot,
    ) -> Result<usize, StateError> {
        let mut published = 0;

        for button in 0..before.buttons.len().max(after.buttons.len()) {
            let was = before.buttons.get(button).copied().unwrap_or(false);
            let pressed = after.buttons.get(button).copied().unwrap_or(false);
            if pressed == was {
                continue;
            }
            let channel = if pressed {
                channels::BUTTON_PRESSED
            } else {
                channels::BUTTON_RELEASED
            };
            self.bus.publish_event(channel, &ButtonEvent { gamepad, button })?;
            published += 1;
        }

        for axis in 0..before.axes.len().max(after.axes.len()) {
            let was = before.axes.get(axis).copied().unwrap_or(0.0);
            let value = after.axes.get(axis).copied().unwrap_or(0.0);
            if value == was {
                continue;
            }
            self.bus
                .publish_event(channels::AXIS_CHANGED, &AxisEvent { gamepad, axis, value })?;
            published += 1;
        }

        Ok(published)
    }
}

impl<S: GamepadSource + 'static> InputPoller<S> {
    /// Poll once at the start of every frame's `before` phase.
    pub fn attach(self, frames: &FrameLoop) -> Subscription {
        let poller = Arc::new(Mutex::new(self));
        frames.before(move |_| {
            let result = poller.lock().poll().map(drop).map_err(anyhow::Error::from);
            future::ready(result)
        })
    }
}

impl<S> fmt::Debug for InputPoller<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputPoller")
            .field("slots", &self.previous.len())
            .finish_non_exhaustive()
    }
}

/// Which side of zero an axis is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisDirection {
    /// Below zero.
    Negative,
    /// Exactly zero.
    Neutral,
    /// Above zero.
    Positive,
}

impl AxisDirection {
    /// Classify an axis position.
    #[must_use]
    pub fn of(value: f64) -> Self {
        if value > 0.0 {
            AxisDirection::Positive
        } else if value < 0.0 {
            AxisDirection::Negative
        } else {
            AxisDirection::Neutral
        }
    }
}

/// One analog axis of one gamepad, fed by `input.gamepad.axis.changed`.
#[derive(Debug)]
pub struct Axis {
    gamepad: usize,
    axis: usize,
    value: ObservableValue<f64>,
    direction: ObservableValue<AxisDirection>,
    feed: Subscription,
}

impl Axis {
    /// Track `axis` of `gamepad`, starting at `initial`.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial value cannot be stored.
    pub fn new(state: &StateContext, gamepad: usize, axis: usize, initial: f64) -> Result<Self, StateError> {
        let value = state.observable(channels::axis_value(gamepad, axis), initial);
        let direction = state.observable(
            channels::axis_direction(gamepad, axis),
            AxisDirection::of(initial),
        );
        value.set(initial)?;
        direction.set(AxisDirection::of(initial))?;

        let (feed_value, feed_direction) = (value.clone(), direction.clone());
        let feed = state
            .bus()
            .subscribe_event::<AxisEvent, _>(channels::AXIS_CHANGED, move |event| {
                if event.gamepad != gamepad || event.axis != axis {
                    return;
                }
                let stored = feed_value
                    .set(event.value)
                    .and_then(|value| feed_direction.set(AxisDirection::of(value)));
                if let Err(err) = stored {
                    warn!(gamepad, axis, %err, "axis update dropped");
                }
            });

        Ok(Self {
            gamepad,
            axis,
            value,
            direction,
            feed,
        })
    }

    /// Gamepad slot this axis belongs to.
    #[must_use]
    pub fn gamepad(&self) -> usize {
        self.gamepad
    }

    /// Axis index on the gamepad.
    #[must_use]
    pub fn axis(&self) -> usize {
        self.axis
    }

    /// The current position.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value.get()
    }

    /// Which side of zero the axis is on.
    #[must_use]
    pub fn direction(&self) -> AxisDirection {
        self.direction.get()
    }

    /// Call `callback` with every new position.
    pub fn on_changed<F>(&self, callback: F) -> Subscription
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.value.on_changed(move |change| callback(change.next_value))
    }

    /// Call `callback` each time the axis crosses into the positive range.
    pub fn on_positive<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_direction(AxisDirection::Positive, callback)
    }

    /// Call `callback` each time the axis crosses into the negative range.
    pub fn on_negative<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_direction(AxisDirection::Negative, callback)
    }

    /// Call `callback` each time the axis returns to exactly zero.
    pub fn on_neutral<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_direction(AxisDirection::Neutral, callback)
    }

    fn on_direction<F>(&self, target: AxisDirection, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.direction.on_changed(move |change| {
            if change.next_value == target {
                callback();
            }
        })
    }
}

impl Drop for Axis {
    fn drop(&mut self) {
        self.feed.unsubscribe();
    }
}

/// One button of one gamepad, fed by the pressed/released channels.
#[derive(Debug)]
pub struct Button {
    gamepad: usize,
    button: usize,
    pressed: ObservableValue<bool>,
    feeds: [Subscription; 2],
}

impl Button {
    /// Track `button` of `gamepad`. Reads as released until the first event.
    #[must_use]
    pub fn new(state: &StateContext, gamepad: usize, button: usize) -> Self {
        let pressed = state.observable(channels::button_state(gamepad, button), false);
        let feed = |channel: &'static str, down: bool| {
            let pressed = pressed.clone();
            state
                .bus()
                .subscribe_event::<ButtonEvent, _>(channel, move |event| {
                    if event.gamepad != gamepad || event.button != button {
                        return;
                    }
                    if let Err(err) = pressed.set(down) {
                        warn!(gamepad, button, %err, "button update dropped");
                    }
                })
        };
        let feeds = [
            feed(channels::BUTTON_PRESSED, true),
            feed(channels::BUTTON_RELEASED, false),
        ];

        Self {
            gamepad,
            button,
            pressed,
            feeds,
        }
    }

    /// Gamepad slot this button belongs to.
    #[must_use]
    pub fn gamepad(&self) -> usize {
        self.gamepad
    }

    /// Button index on the gamepad.
    #[must_use]
    pub fn button(&self) -> usize {
        self.button
    }

    /// Whether the button is currently held.
    #[must_use]
    pub fn is_pressed(&self) -> bool {
        self.pressed.get()
    }

    /// Call `callback` on every released → pressed edge.
    pub fn on_pressed<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.pressed.on_changed(move |change| {
            if change.next_value && !change.previous_value.unwrap_or(false) {
                callback();
            }
        })
    }

    /// Call `callback` on every pressed → released edge.
    pub fn on_released<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.pressed.on_changed(move |change| {
            if !change.next_value && change.previous_value.unwrap_or(false) {
                callback();
            }
        })
    }
}

impl Drop for Button {
    fn drop(&mut self) {
        for feed in &mut self.feeds {
            feed.unsubscribe();
        }
    }
}
