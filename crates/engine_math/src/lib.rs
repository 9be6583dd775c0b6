//! # engine_math
//!
//! Spatial component kinds. Re-exports [`glam`] for linear algebra and
//! defines the `positioned` and `sized` kinds.

pub mod extent;
pub mod transform;

pub use glam::{EulerRot, Mat4, Quat, Vec2, Vec3, Vec4};

pub use extent::Extent;
pub use transform::Transform;
