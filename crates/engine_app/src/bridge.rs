//! Wiring between the world and the rendering/physics backends.
//!
//! Each bridge registers one [`System`] that mirrors component membership
//! into backend entities, plus one frame-phase callback:
//!
//! - renderer: `after` phase pushes transforms and materials, then presents.
//! - physics: `before` phase steps the simulation by the frame delta and
//!   copies simulated transforms back into `positioned` components.
//!
//! An entity the bridge created but the backend no longer knows fails the
//! step with [`BackendError::EntityUnavailable`].

use std::fmt;
use std::sync::Arc;

use engine_component::{Component, ComponentRecord, ComponentRegistry, EntityId};
use engine_math::Transform;
use engine_state::Subscription;
use engine_system::{System, SystemId, SystemScheduler};
use futures::future;
use indexmap::IndexSet;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::backend::{PhysicsBackend, RenderBackend};
use crate::components::{Rendered, Solid};
use crate::error::BackendError;
use crate::frame::Frame;
use crate::world::World;

type Tracked = Arc<Mutex<IndexSet<EntityId>>>;

/// A backend attached to a world.
///
/// Dropping a bridge leaves it attached; call [`detach`](Self::detach).
#[must_use = "a bridge stays attached until detached"]
pub struct Bridge {
    backend: &'static str,
    scheduler: SystemScheduler,
    system: SystemId,
    phase: Subscription,
    tracked: Tracked,
}

impl Bridge {
    /// The membership system this bridge registered.
    #[must_use]
    pub fn system(&self) -> SystemId {
        self.system
    }

    /// Entities this bridge has created in its backend.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityId> {
        self.tracked.lock().iter().copied().collect()
    }

    /// Stop driving the backend. Entities already created are left in place.
    pub fn detach(&mut self) {
        if self.scheduler.unregister(self.system) {
            debug!(backend = self.backend, "bridge detached");
        }
        self.phase.unsubscribe();
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("backend", &self.backend)
            .field("system", &self.system)
            .field("entities", &self.tracked.lock().len())
            .finish_non_exhaustive()
    }
}

/// Drive `backend` from the `rendered` components of `world`.
pub fn attach_renderer<R>(world: &World, backend: Arc<Mutex<R>>) -> Bridge
where
    R: RenderBackend + 'static,
{
    let tracked = Tracked::default();
    let registry = world.registry().clone();

    let system = System::of::<Rendered>()
        .on_added({
            let (backend, tracked) = (Arc::clone(&backend), Arc::clone(&tracked));
            move |added: Vec<ComponentRecord>| {
                future::ready(create_rendered(&backend, &tracked, &added))
            }
        })
        .on_removed({
            let (backend, tracked, registry) =
                (Arc::clone(&backend), Arc::clone(&tracked), registry.clone());
            move |removed: Vec<ComponentRecord>| {
                release::<Rendered>(&registry, &tracked, &removed, |entity| {
                    backend.lock().delete_entity(entity);
                });
                future::ready(Ok(()))
            }
        });
    let system = world.add_system(system);

    let phase = world.frames().after({
        let tracked = Arc::clone(&tracked);
        move |frame| future::ready(present(&registry, &backend, &tracked, frame))
    });

    debug!(%system, "renderer attached");
    Bridge {
        backend: "render",
        scheduler: world.scheduler().clone(),
        system,
        phase,
        tracked,
    }
}

/// Drive `backend` from the `solid` components of `world`.
pub fn attach_physics<P>(world: &World, backend: Arc<Mutex<P>>) -> Bridge
where
    P: PhysicsBackend + 'static,
{
    let tracked = Tracked::default();
    let registry = world.registry().clone();

    let system = System::of::<Solid>()
        .on_update({
            let (backend, tracked, registry) =
                (Arc::clone(&backend), Arc::clone(&tracked), registry.clone());
            move |current: Vec<ComponentRecord>| {
                future::ready(sync_bodies(&registry, &backend, &tracked, &current))
            }
        })
        .on_added({
            let (backend, tracked, registry) =
                (Arc::clone(&backend), Arc::clone(&tracked), registry.clone());
            move |added: Vec<ComponentRecord>| {
                future::ready(create_bodies(&registry, &backend, &tracked, &added))
            }
        })
        .on_removed({
            let (backend, tracked, registry) =
                (Arc::clone(&backend), Arc::clone(&tracked), registry.clone());
            move |removed: Vec<ComponentRecord>| {
                release::<Solid>(&registry, &tracked, &removed, |entity| {
                    backend.lock().delete_entity(entity);
                });
                future::ready(Ok(()))
            }
        });
    let system = world.add_system(system);

    let phase = world.frames().before({
        let tracked = Arc::clone(&tracked);
        move |frame| future::ready(step(&registry, &backend, &tracked, frame))
    });

    debug!(%system, "physics attached");
    Bridge {
        backend: "physics",
        scheduler: world.scheduler().clone(),
        system,
        phase,
        tracked,
    }
}

fn create_rendered<R: RenderBackend>(
    backend: &Mutex<R>,
    tracked: &Mutex<IndexSet<EntityId>>,
    added: &[ComponentRecord],
) -> anyhow::Result<()> {
    let mut backend = backend.lock();
    let mut tracked = tracked.lock();
    for record in added {
        if tracked.contains(&record.entity) {
            continue;
        }
        let handle = backend.create_entity(record.entity)?;
        tracked.insert(record.entity);
        debug!(entity = %record.entity, %handle, "render entity attached");
    }
    Ok(())
}

fn present<R: RenderBackend>(
    registry: &ComponentRegistry,
    backend: &Mutex<R>,
    tracked: &Mutex<IndexSet<EntityId>>,
    frame: Frame,
) -> anyhow::Result<()> {
    let entities: Vec<EntityId> = tracked.lock().iter().copied().collect();
    let mut backend = backend.lock();
    for entity in entities {
        let handle = backend
            .entity_handle(entity)
            .ok_or(BackendError::EntityUnavailable {
                backend: "render",
                entity,
            })?;
        if let Some(transform) = registry.find::<Transform>(entity) {
            backend.set_transform(handle, &transform.get())?;
        }
        if let Some(rendered) = registry.find::<Rendered>(entity) {
            backend.set_material(handle, &rendered.get())?;
        }
    }
    backend.render_frame()?;
    trace!(frame = frame.index, "frame rendered");
    Ok(())
}

fn create_bodies<P: PhysicsBackend>(
    registry: &ComponentRegistry,
    backend: &Mutex<P>,
    tracked: &Mutex<IndexSet<EntityId>>,
    added: &[ComponentRecord],
) -> anyhow::Result<()> {
    let mut backend = backend.lock();
    let mut tracked = tracked.lock();
    for record in added {
        if tracked.contains(&record.entity) {
            continue;
        }
        let Some(body) = registry.handle::<Solid>(record.id)? else {
            continue;
        };
        let at = registry
            .find::<Transform>(record.entity)
            .map(|transform| transform.get())
            .unwrap_or_default();
        let handle = backend.create_entity(record.entity, &body.get(), &at)?;
        tracked.insert(record.entity);
        debug!(entity = %record.entity, %handle, "physics body attached");
    }
    Ok(())
}

fn sync_bodies<P: PhysicsBackend>(
    registry: &ComponentRegistry,
    backend: &Mutex<P>,
    tracked: &Mutex<IndexSet<EntityId>>,
    current: &[ComponentRecord],
) -> anyhow::Result<()> {
    let mut backend = backend.lock();
    let tracked = tracked.lock();
    for record in current.iter().filter(|record| tracked.contains(&record.entity)) {
        let Some(body) = registry.handle::<Solid>(record.id)? else {
            continue;
        };
        let handle = backend
            .entity_handle(record.entity)
            .ok_or(BackendError::EntityUnavailable {
                backend: "physics",
                entity: record.entity,
            })?;
        backend.update_body(handle, &body.get())?;
    }
    Ok(())
}

fn step<P: PhysicsBackend>(
    registry: &ComponentRegistry,
    backend: &Mutex<P>,
    tracked: &Mutex<IndexSet<EntityId>>,
    frame: Frame,
) -> anyhow::Result<()> {
    // The first frame has nothing to integrate over.
    let Some(seconds) = frame.delta_seconds() else {
        return Ok(());
    };
    let entities: Vec<EntityId> = tracked.lock().iter().copied().collect();
    let simulated = {
        let mut backend = backend.lock();
        backend.advance(seconds)?;
        let mut simulated = Vec::with_capacity(entities.len());
        for entity in entities {
            let handle = backend
                .entity_handle(entity)
                .ok_or(BackendError::EntityUnavailable {
                    backend: "physics",
                    entity,
                })?;
            if let Some(transform) = backend.transform(handle) {
                simulated.push((entity, transform));
            }
        }
        simulated
    };

    // Change listeners may call back into the backend, so the lock is gone.
    for (entity, transform) in simulated {
        if let Some(positioned) = registry.find::<Transform>(entity) {
            positioned.set(transform)?;
        }
    }
    trace!(frame = frame.index, seconds, "physics stepped");
    Ok(())
}

/// Forget entities that no longer carry a `T` and hand them to `delete`.
fn release<T: Component>(
    registry: &ComponentRegistry,
    tracked: &Mutex<IndexSet<EntityId>>,
    removed: &[ComponentRecord],
    mut delete: impl FnMut(EntityId),
) {
    // `delete` locks the backend, which is always taken before `tracked`.
    let released: Vec<EntityId> = {
        let mut tracked = tracked.lock();
        removed
            .iter()
            .map(|record| record.entity)
            .filter(|entity| registry.find::<T>(*entity).is_none())
            .filter(|entity| tracked.shift_remove(entity))
            .collect()
    };
    for entity in released {
        delete(entity);
        debug!(%entity, kind = T::type_name(), "backend entity released");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use engine_math::Vec3;

    use crate::clock::ManualClock;
    use crate::error::FrameError;
    use crate::frame::{Phase, TickConfig};
    use crate::headless::{HeadlessPhysics, HeadlessRenderer};

    use super::*;

    fn manual_world() -> (World, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (World::with_clock(TickConfig::default(), clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_renderer_follows_membership() {
        let (world, _clock) = manual_world();
        let renderer = Arc::new(Mutex::new(HeadlessRenderer::new()));
        let bridge = attach_renderer(&world, Arc::clone(&renderer));

        let entity = world.spawn();
        entity.insert(Transform::from_position(Vec3::Z)).unwrap();
        entity.insert(Rendered::mesh("cube")).unwrap();

        world.tick().await.unwrap();
        {
            let renderer = renderer.lock();
            let drawn = renderer.entity(entity.id()).unwrap();
            assert_eq!(drawn.transform.unwrap().position, Vec3::Z);
            assert_eq!(drawn.material.as_ref().unwrap().mesh, "cube");
            assert_eq!(renderer.frames_rendered(), 1);
        }
        assert_eq!(bridge.entities(), vec![entity.id()]);

        assert_eq!(entity.remove::<Rendered>(), 1);
        world.tick().await.unwrap();
        assert!(renderer.lock().is_empty());
        assert_eq!(renderer.lock().frames_rendered(), 2);
        assert!(bridge.entities().is_empty());
    }

    #[tokio::test]
    async fn test_missing_render_entity_fails_frame() {
        let (world, _clock) = manual_world();
        let renderer = Arc::new(Mutex::new(HeadlessRenderer::new()));
        let _bridge = attach_renderer(&world, Arc::clone(&renderer));

        let entity = world.spawn();
        entity.insert(Rendered::mesh("cube")).unwrap();
        world.tick().await.unwrap();

        renderer.lock().delete_entity(entity.id());
        let err = world.tick().await.unwrap_err();
        let FrameError::Phase { phase, cause, .. } = err else {
            panic!("expected a phase failure");
        };
        assert_eq!(phase, Phase::After);
        assert!(matches!(
            cause.downcast_ref::<BackendError>(),
            Some(BackendError::EntityUnavailable { backend: "render", entity: e }) if *e == entity.id()
        ));
    }

    #[tokio::test]
    async fn test_physics_moves_positioned_component() {
        let (world, clock) = manual_world();
        let physics = Arc::new(Mutex::new(HeadlessPhysics::new()));
        let _bridge = attach_physics(&world, Arc::clone(&physics));

        let entity = world.spawn();
        let position = entity.insert(Transform::IDENTITY).unwrap();
        entity.insert(Solid::moving(1.0, Vec3::X * 2.0)).unwrap();

        // First frame: no delta, body gets created.
        world.tick().await.unwrap();
        assert_eq!(physics.lock().len(), 1);
        assert_eq!(physics.lock().elapsed(), 0.0);

        clock.advance(Duration::from_millis(500));
        world.tick().await.unwrap();
        assert_eq!(position.get().position, Vec3::new(1.0, 0.0, 0.0));

        // Velocity changes reach the backend on the next frame.
        entity
            .get::<Solid>()
            .unwrap()
            .set(Solid::moving(1.0, Vec3::ZERO))
            .unwrap();
        clock.advance(Duration::from_millis(500));
        world.tick().await.unwrap();
        clock.advance(Duration::from_millis(500));
        world.tick().await.unwrap();
        assert_eq!(position.get().position, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_release_unlocks_tracked_before_delete() {
        let (world, _clock) = manual_world();
        let entity = world.spawn();
        let record = entity.insert(Rendered::mesh("cube")).unwrap().record().clone();
        assert_eq!(entity.remove::<Rendered>(), 1);

        let tracked: Tracked = Arc::new(Mutex::new(IndexSet::from([entity.id()])));
        let mut deleted = Vec::new();
        release::<Rendered>(world.registry(), &tracked, &[record], |entity| {
            // Would deadlock if `tracked` were still held.
            assert!(tracked.lock().is_empty());
            deleted.push(entity);
        });
        assert_eq!(deleted, vec![entity.id()]);
    }

    #[tokio::test]
    async fn test_detached_bridge_stops_rendering() {
        let (world, _clock) = manual_world();
        let renderer = Arc::new(Mutex::new(HeadlessRenderer::new()));
        let mut bridge = attach_renderer(&world, Arc::clone(&renderer));

        world.tick().await.unwrap();
        bridge.detach();
        world.tick().await.unwrap();

        assert_eq!(renderer.lock().frames_rendered(), 1);
        assert!(world.scheduler().is_empty());
    }
}
