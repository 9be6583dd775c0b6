//! Channel and key naming.
//!
//! Every well-known channel lives here so producers and consumers agree on
//! the strings. Keys and channels are opaque; nothing checks that two
//! unrelated uses do not pick the same name.

/// Suffix appended to a key to form its change channel.
pub const CHANGED_SUFFIX: &str = "changed";

// ── Engine ──────────────────────────────────────────────────────────────────

/// Failed frame steps are reported here as [`Diagnostic`](crate::messages::Diagnostic).
pub const DIAGNOSTIC: &str = "engine.diagnostic";

/// Frame counter key.
pub const FRAME_INDEX: &str = "frame.index";

/// Timestamp of the most recent frame, in clock microseconds.
pub const FRAME_TIMESTAMP: &str = "frame.timestamp";

/// Whether the frame loop is paused.
pub const FRAME_PAUSED: &str = "frame.paused";

/// Set once the audio subsystem may start producing sound.
pub const AUDIO_READY: &str = "audio.ready";

// ── Raw input ───────────────────────────────────────────────────────────────

/// A gamepad button went down. Payload: [`ButtonEvent`](crate::messages::ButtonEvent).
pub const BUTTON_PRESSED: &str = "input.gamepad.button.pressed";

/// A gamepad button went up. Payload: [`ButtonEvent`](crate::messages::ButtonEvent).
pub const BUTTON_RELEASED: &str = "input.gamepad.button.released";

/// A gamepad axis moved. Payload: [`AxisEvent`](crate::messages::AxisEvent).
pub const AXIS_CHANGED: &str = "input.gamepad.axis.changed";

/// A gamepad was plugged in. Payload: [`GamepadEvent`](crate::messages::GamepadEvent).
pub const GAMEPAD_CONNECTED: &str = "input.gamepad.connected";

/// A gamepad was unplugged. Payload: [`GamepadEvent`](crate::messages::GamepadEvent).
pub const GAMEPAD_DISCONNECTED: &str = "input.gamepad.disconnected";

/// Pointer pressed anywhere on the surface.
pub const POINTER_DOWN: &str = "input.pointer.down";

/// Any keyboard key pressed.
pub const KEY_DOWN: &str = "input.keyboard.down";

/// Touch started.
pub const TOUCH_START: &str = "input.touch.start";

/// Channels that count as a user interaction for the audio gate.
pub const USER_INTERACTION: [&str; 3] = [POINTER_DOWN, KEY_DOWN, TOUCH_START];

// ── Dynamic builders ────────────────────────────────────────────────────────

/// Build the change channel for a key.
///
/// `<key>.changed`
#[must_use]
pub fn changed(key: &str) -> String {
    format!("{key}.{CHANGED_SUFFIX}")
}

/// Build the store key holding a component's value.
///
/// `component.<id>`
#[must_use]
pub fn component_value(id: impl std::fmt::Display) -> String {
    format!("component.{id}")
}

/// Build the store key for a derived button state.
///
/// `gamepad.<gamepad>.button.<button>`
#[must_use]
pub fn button_state(gamepad: usize, button: usize) -> String {
    format!("gamepad.{gamepad}.button.{button}")
}

/// Build the store key for a derived axis value.
///
/// `gamepad.<gamepad>.axis.<axis>`
#[must_use]
pub fn axis_value(gamepad: usize, axis: usize) -> String {
    format!("gamepad.{gamepad}.axis.{axis}")
}

/// Build the store key for a derived axis direction.
///
/// `gamepad.<gamepad>.axis.<axis>.direction`
#[must_use]
pub fn axis_direction(gamepad: usize, axis: usize) -> String {
    format!("gamepad.{gamepad}.axis.{axis}.direction")
}
