//! The `sized` component kind.

use engine_component::Component;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned size of an entity, in world units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Extent {
    /// Width, height and depth.
    pub size: Vec3,
}

impl Extent {
    /// A cube with edge length `edge`.
    #[must_use]
    pub fn cube(edge: f32) -> Self {
        Self {
            size: Vec3::splat(edge),
        }
    }

    /// Half the size along each axis.
    #[must_use]
    pub fn half_extents(&self) -> Vec3 {
        self.size * 0.5
    }

    /// Volume enclosed by the box.
    #[must_use]
    pub fn volume(&self) -> f32 {
        self.size.x * self.size.y * self.size.z
    }
}

impl Default for Extent {
    fn default() -> Self {
        Self::cube(1.0)
    }
}

impl Component for Extent {
    fn type_name() -> &'static str {
        "sized"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube() {
        let e = Extent::cube(2.0);
        assert_eq!(e.half_extents(), Vec3::ONE);
        assert_eq!(e.volume(), 8.0);
    }

    #[test]
    fn test_json_shape() {
        let value = serde_json::to_value(Extent::cube(1.0)).unwrap();
        assert_eq!(value, serde_json::json!({ "size": [1.0, 1.0, 1.0] }));
    }
}
