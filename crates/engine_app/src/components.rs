//! Component kinds driven by the backend bridges.
//!
//! Position lives in [`engine_math::Transform`] (`positioned`); the kinds here
//! describe how an entity is drawn and how it moves.

use engine_component::Component;
use engine_math::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Drawn by the render backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rendered {
    /// Mesh name understood by the backend.
    pub mesh: String,
    /// Linear RGBA color.
    pub color: Vec4,
    /// Hidden entities stay registered with the backend but are not drawn.
    pub visible: bool,
}

impl Rendered {
    /// A visible white `mesh`.
    #[must_use]
    pub fn mesh(mesh: impl Into<String>) -> Self {
        Self {
            mesh: mesh.into(),
            color: Vec4::ONE,
            visible: true,
        }
    }

    /// Same mesh, different color.
    #[must_use]
    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }
}

impl Component for Rendered {
    fn type_name() -> &'static str {
        "rendered"
    }
}

/// Simulated by the physics backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Solid {
    /// Mass in kilograms. Zero means static.
    pub mass: f32,
    /// Linear velocity in world units per second.
    pub velocity: Vec3,
}

impl Solid {
    /// A static body.
    pub const STATIC: Self = Self {
        mass: 0.0,
        velocity: Vec3::ZERO,
    };

    /// A dynamic body moving at `velocity`.
    #[must_use]
    pub fn moving(mass: f32, velocity: Vec3) -> Self {
        Self { mass, velocity }
    }

    /// Returns `true` if the body never moves.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.mass <= 0.0
    }
}

impl Default for Solid {
    fn default() -> Self {
        Self::STATIC
    }
}

impl Component for Solid {
    fn type_name() -> &'static str {
        "solid"
    }
}
