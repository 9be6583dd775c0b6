//! # engine_app
//!
//! Runtime layer of the engine core: the frame loop that drives time, the
//! [`World`] that ties state, components and systems together, gamepad
//! input, the audio readiness gate, and the bridges that feed rendering and
//! physics backends.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use engine_app::{HeadlessRenderer, Rendered, TickConfig, World, attach_renderer};
//! use parking_lot::Mutex;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let world = World::new(TickConfig { refresh_rate: 60.0, max_frames: 120 });
//! let renderer = Arc::new(Mutex::new(HeadlessRenderer::new()));
//! let _bridge = attach_renderer(&world, renderer);
//!
//! world.spawn().insert(Rendered::mesh("cube"))?;
//! world.run().await;
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod backend;
pub mod bridge;
pub mod clock;
pub mod components;
pub mod error;
pub mod frame;
pub mod headless;
pub mod input;
pub mod world;

pub use audio::AudioGate;
pub use backend::{BackendHandle, PhysicsBackend, RenderBackend};
pub use bridge::{Bridge, attach_physics, attach_renderer};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use components::{Rendered, Solid};
pub use error::{BackendError, FrameError};
pub use frame::{Frame, FrameLoop, Phase, TickConfig};
pub use headless::{HeadlessPhysics, HeadlessRenderer};
pub use input::{Axis, AxisDirection, Button, GamepadSnapshot, GamepadSource, InputPoller};
pub use world::World;
