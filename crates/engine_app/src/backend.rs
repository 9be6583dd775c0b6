//! Interfaces of the rendering and physics collaborators.
//!
//! The core only pushes state into these; neither backend writes into the
//! key store directly. The bridges in [`crate::bridge`] do the wiring.

use std::fmt;

use engine_component::EntityId;
use engine_math::Transform;

use crate::components::{Rendered, Solid};
use crate::error::BackendError;

/// Opaque backend-side id of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendHandle(pub u64);

impl fmt::Display for BackendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A rendering backend.
pub trait RenderBackend: Send {
    /// Start drawing `entity`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot allocate the entity.
    fn create_entity(&mut self, entity: EntityId) -> Result<BackendHandle, BackendError>;

    /// Stop drawing `entity`. Unknown entities are ignored.
    fn delete_entity(&mut self, entity: EntityId);

    /// The handle of `entity`, if the backend knows it.
    fn entity_handle(&self, entity: EntityId) -> Option<BackendHandle>;

    /// Place an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if `handle` is unknown.
    fn set_transform(&mut self, handle: BackendHandle, transform: &Transform) -> Result<(), BackendError>;

    /// Change what an entity looks like.
    ///
    /// # Errors
    ///
    /// Returns an error if `handle` is unknown.
    fn set_material(&mut self, handle: BackendHandle, rendered: &Rendered) -> Result<(), BackendError>;

    /// Present one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if presenting fails.
    fn render_frame(&mut self) -> Result<(), BackendError>;
}

/// A physics backend.
pub trait PhysicsBackend: Send {
    /// Start simulating `entity` as `body`, placed at `at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot allocate the body.
    fn create_entity(
        &mut self,
        entity: EntityId,
        body: &Solid,
        at: &Transform,
    ) -> Result<BackendHandle, BackendError>;

    /// Stop simulating `entity`. Unknown entities are ignored.
    fn delete_entity(&mut self, entity: EntityId);

    /// The handle of `entity`, if the backend knows it.
    fn entity_handle(&self, entity: EntityId) -> Option<BackendHandle>;

    /// Replace the body parameters of an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if `handle` is unknown.
    fn update_body(&mut self, handle: BackendHandle, body: &Solid) -> Result<(), BackendError>;

    /// Step the simulation by `seconds`.
    ///
    /// # Errors
    ///
    /// Returns an error if the step fails.
    fn advance(&mut self, seconds: f64) -> Result<(), BackendError>;

    /// Current simulated transform of an entity.
    fn transform(&self, handle: BackendHandle) -> Option<Transform>;
}
