//! Event payloads.
//!
//! All payload types derive `Serialize` and `Deserialize`; they travel over
//! the bus as JSON values. Routing (which gamepad, which axis) is carried in
//! the payload, not in the channel name.

use serde::{Deserialize, Serialize};

// ── Observable values ───────────────────────────────────────────────────────

/// Published on a value's change channel when `set` stores a different value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change<T> {
    /// The value stored before the change, if any.
    pub previous_value: Option<T>,
    /// The value stored by the change.
    pub next_value: T,
}

// ── Raw input ───────────────────────────────────────────────────────────────

/// A button edge on one gamepad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonEvent {
    /// Device slot.
    pub gamepad: usize,
    /// Button index on the device.
    pub button: usize,
}

/// A new reading for one gamepad axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisEvent {
    /// Device slot.
    pub gamepad: usize,
    /// Axis index on the device.
    pub axis: usize,
    /// The new axis value, nominally in `[-1.0, 1.0]`.
    pub value: f64,
}

/// A gamepad hot-plug notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamepadEvent {
    /// Device slot.
    pub gamepad: usize,
}

// ── Diagnostics ─────────────────────────────────────────────────────────────

/// A failed frame step, published on [`channels::DIAGNOSTIC`](crate::channels::DIAGNOSTIC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Index of the frame whose step failed.
    pub frame: u64,
    /// The phase that failed (`"before"`, `"during"`, `"after"`), if known.
    pub phase: Option<String>,
    /// Human-readable failure description.
    pub message: String,
}
