//! In-memory backends for tests and the demo binary.

use engine_component::EntityId;
use engine_math::Transform;
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::backend::{BackendHandle, PhysicsBackend, RenderBackend};
use crate::components::{Rendered, Solid};
use crate::error::BackendError;

/// What the headless renderer last saw for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnEntity {
    /// Handle returned from `create_entity`.
    pub handle: BackendHandle,
    /// Last transform pushed, if any.
    pub transform: Option<Transform>,
    /// Last material pushed, if any.
    pub material: Option<Rendered>,
}

/// A renderer that records instead of drawing.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    next_handle: u64,
    entities: IndexMap<EntityId, DrawnEntity>,
    frames: u64,
}

impl HeadlessRenderer {
    /// An empty renderer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames presented so far.
    #[must_use]
    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    /// The recorded state of `entity`.
    #[must_use]
    pub fn entity(&self, entity: EntityId) -> Option<&DrawnEntity> {
        self.entities.get(&entity)
    }

    /// Number of entities being drawn.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` when nothing is being drawn.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn by_handle(&mut self, handle: BackendHandle) -> Result<&mut DrawnEntity, BackendError> {
        self.entities
            .values_mut()
            .find(|drawn| drawn.handle == handle)
            .ok_or_else(|| BackendError::Failed {
                backend: "render",
                message: format!("unknown handle {handle}"),
            })
    }
}

impl RenderBackend for HeadlessRenderer {
    fn create_entity(&mut self, entity: EntityId) -> Result<BackendHandle, BackendError> {
        if let Some(existing) = self.entities.get(&entity) {
            return Ok(existing.handle);
        }
        self.next_handle += 1;
        let handle = BackendHandle(self.next_handle);
        self.entities.insert(
            entity,
            DrawnEntity {
                handle,
                transform: None,
                material: None,
            },
        );
        debug!(%entity, %handle, "render entity created");
        Ok(handle)
    }

    fn delete_entity(&mut self, entity: EntityId) {
        if self.entities.shift_remove(&entity).is_some() {
            debug!(%entity, "render entity deleted");
        }
    }

    fn entity_handle(&self, entity: EntityId) -> Option<BackendHandle> {
        self.entities.get(&entity).map(|drawn| drawn.handle)
    }

    fn set_transform(&mut self, handle: BackendHandle, transform: &Transform) -> Result<(), BackendError> {
        self.by_handle(handle)?.transform = Some(*transform);
        Ok(())
    }

    fn set_material(&mut self, handle: BackendHandle, rendered: &Rendered) -> Result<(), BackendError> {
        self.by_handle(handle)?.material = Some(rendered.clone());
        Ok(())
    }

    fn render_frame(&mut self) -> Result<(), BackendError> {
        self.frames += 1;
        trace!(frame = self.frames, entities = self.entities.len(), "frame presented");
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Body {
    handle: BackendHandle,
    solid: Solid,
    transform: Transform,
}

/// Explicit Euler integration of constant velocities. No collisions.
#[derive(Debug, Default)]
pub struct HeadlessPhysics {
    next_handle: u64,
    bodies: IndexMap<EntityId, Body>,
    elapsed: f64,
}

impl HeadlessPhysics {
    /// An empty world with no elapsed time.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated seconds so far.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Number of simulated bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Returns `true` when no bodies are simulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

impl PhysicsBackend for HeadlessPhysics {
    fn create_entity(
        &mut self,
        entity: EntityId,
        body: &Solid,
        at: &Transform,
    ) -> Result<BackendHandle, BackendError> {
        if let Some(existing) = self.bodies.get(&entity) {
            return Ok(existing.handle);
        }
        self.next_handle += 1;
        let handle = BackendHandle(self.next_handle);
        self.bodies.insert(
            entity,
            Body {
                handle,
                solid: *body,
                transform: *at,
            },
        );
        debug!(%entity, %handle, mass = body.mass, "physics body created");
        Ok(handle)
    }

    fn delete_entity(&mut self, entity: EntityId) {
        if self.bodies.shift_remove(&entity).is_some() {
            debug!(%entity, "physics body deleted");
        }
    }

    fn entity_handle(&self, entity: EntityId) -> Option<BackendHandle> {
        self.bodies.get(&entity).map(|body| body.handle)
    }

    fn update_body(&mut self, handle: BackendHandle, solid: &Solid) -> Result<(), BackendError> {
        let body = self
            .bodies
            .values_mut()
            .find(|body| body.handle == handle)
            .ok_or_else(|| BackendError::Failed {
                backend: "physics",
                message: format!("unknown handle {handle}"),
            })?;
        body.solid = *solid;
        Ok(())
    }

    fn advance(&mut self, seconds: f64) -> Result<(), BackendError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(BackendError::Failed {
                backend: "physics",
                message: format!("invalid time step {seconds}"),
            });
        }
        let step = seconds as f32;
        for body in self.bodies.values_mut() {
            if !body.solid.is_static() {
                body.transform.position += body.solid.velocity * step;
            }
        }
        self.elapsed += seconds;
        Ok(())
    }

    fn transform(&self, handle: BackendHandle) -> Option<Transform> {
        self.bodies
            .values()
            .find(|body| body.handle == handle)
            .map(|body| body.transform)
    }
}
