//! The world: one state context with everything that runs on it.
//!
//! A [`World`] owns the [`ComponentRegistry`], the [`SystemScheduler`] and
//! the [`FrameLoop`], and ticks the scheduler in every frame's `during`
//! phase.

use std::sync::Arc;

use engine_component::{ComponentRegistry, Entity, EntityId};
use engine_state::{StateContext, Subscription};
use engine_system::{System, SystemId, SystemScheduler};
use tracing::debug;

use crate::clock::{Clock, MonotonicClock};
use crate::error::FrameError;
use crate::frame::{Frame, FrameLoop, TickConfig};

/// Shared state plus the loop that drives it.
#[derive(Debug)]
pub struct World {
    state: StateContext,
    registry: ComponentRegistry,
    scheduler: SystemScheduler,
    frames: FrameLoop,
    scheduling: Subscription,
}

impl World {
    /// Create an empty world reading the system monotonic clock.
    #[must_use]
    pub fn new(config: TickConfig) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    /// Create an empty world reading `clock`.
    #[must_use]
    pub fn with_clock(config: TickConfig, clock: Arc<dyn Clock>) -> Self {
        let state = StateContext::new();
        let registry = ComponentRegistry::new(&state);
        let scheduler = SystemScheduler::new(&registry);
        let frames = FrameLoop::with_clock(&state, config, clock);

        let systems = scheduler.clone();
        let scheduling = frames.during(move |_| {
            let systems = systems.clone();
            async move { systems.tick().await }
        });

        Self {
            state,
            registry,
            scheduler,
            frames,
            scheduling,
        }
    }

    /// The shared store and bus.
    #[must_use]
    pub fn state(&self) -> &StateContext {
        &self.state
    }

    /// Component registry of this world.
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Systems ticked in the `during` phase.
    #[must_use]
    pub fn scheduler(&self) -> &SystemScheduler {
        &self.scheduler
    }

    /// The frame loop driving this world.
    #[must_use]
    pub fn frames(&self) -> &FrameLoop {
        &self.frames
    }

    /// Allocate a new entity without any components.
    pub fn spawn(&self) -> Entity {
        self.registry.spawn()
    }

    /// A handle to an existing entity id.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Entity {
        self.registry.entity(id)
    }

    /// Entities that currently own at least one component.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityId> {
        self.registry.entities()
    }

    /// Register a system; it first runs on the next frame.
    pub fn add_system(&self, system: System) -> SystemId {
        let kind = system.kind().to_string();
        let id = self.scheduler.register(system);
        debug!(%id, kind, "system added to world");
        id
    }

    /// Remove a system. Returns `false` if it was not registered.
    pub fn remove_system(&self, id: SystemId) -> bool {
        self.scheduler.unregister(id)
    }

    /// Run one frame. See [`FrameLoop::tick`].
    ///
    /// # Errors
    ///
    /// Returns the first phase failure of the frame.
    pub async fn tick(&self) -> Result<Option<Frame>, FrameError> {
        self.frames.tick().await
    }

    /// Run frames until stopped or the frame cap is reached.
    pub async fn run(&self) -> u64 {
        self.frames.run().await
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.scheduling.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use engine_math::Transform;

    use crate::clock::ManualClock;
    use crate::components::Solid;

    use super::*;

    fn manual_world() -> (World, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (World::with_clock(TickConfig::default(), clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_systems_tick_every_frame() {
        let (world, clock) = manual_world();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        world.add_system(System::of::<Solid>().on_update(move |records| {
            sink.lock().unwrap().push(records.len());
            async { Ok(()) }
        }));

        world.tick().await.unwrap();
        let entity = world.spawn();
        entity.insert(Solid::STATIC).unwrap();
        clock.advance(Duration::from_millis(16));
        world.tick().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
        assert_eq!(world.entities(), vec![entity.id()]);
    }

    #[tokio::test]
    async fn test_paused_world_does_not_tick_systems() {
        let (world, _clock) = manual_world();
        let calls = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&calls);
        let id = world.add_system(System::of::<Transform>().on_update(move |_| {
            *sink.lock().unwrap() += 1;
            async { Ok(()) }
        }));

        world.frames().pause().unwrap();
        world.tick().await.unwrap();
        world.frames().resume().unwrap();
        world.tick().await.unwrap();
        assert!(world.remove_system(id));
        world.tick().await.unwrap();

        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(world.frames().index(), 3);
    }

    #[tokio::test]
    async fn test_system_failure_fails_frame() {
        let (world, _clock) = manual_world();
        world.add_system(System::new("broken").on_update(|_| async { anyhow::bail!("boom") }));

        let err = world.tick().await.unwrap_err();
        assert!(err.to_string().contains("during phase of frame 1"));
    }
}
