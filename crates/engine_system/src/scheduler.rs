//! System scheduler: the list of registered systems and the tick fan-out.
//!
//! Every tick starts all registered systems together and waits for all of
//! them. Systems do not block one another; within one system the three
//! callbacks stay strictly ordered (see [`SystemRunner::tick`]).

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use engine_component::ComponentRegistry;
use futures::future::join_all;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::runner::SystemRunner;
use crate::system::{System, SystemId};

/// Registered systems, in registration order.
///
/// Cloning yields another handle to the same list.
#[derive(Clone)]
pub struct SystemScheduler {
    registry: ComponentRegistry,
    systems: Arc<RwLock<IndexMap<SystemId, Arc<SystemRunner>>>>,
}

impl SystemScheduler {
    /// Create a scheduler that reads membership from `registry`.
    #[must_use]
    pub fn new(registry: &ComponentRegistry) -> Self {
        Self {
            registry: registry.clone(),
            systems: Arc::new(RwLock::new(IndexMap::new())),
        }
    }

    /// Register a system. Its first tick reports every existing component of
    /// its kind as added.
    pub fn register(&self, system: System) -> SystemId {
        let id = system.id;
        info!(system = %id, kind = system.kind, "system registered");
        self.systems
            .write()
            .insert(id, Arc::new(SystemRunner::new(system)));
        id
    }

    /// Remove a system. A tick already in flight still completes it.
    ///
    /// Returns `true` if the system was registered.
    pub fn unregister(&self, id: SystemId) -> bool {
        let removed = self.systems.write().shift_remove(&id).is_some();
        if removed {
            info!(system = %id, "system unregistered");
        }
        removed
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: SystemId) -> bool {
        self.systems.read().contains_key(&id)
    }

    /// Returns the number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.read().len()
    }

    /// Returns `true` if no system is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.read().is_empty()
    }

    /// Tick every registered system concurrently and wait for all of them.
    ///
    /// # Errors
    ///
    /// Every failing system is logged; the first failure (in registration
    /// order) is returned once all systems have finished.
    pub async fn tick(&self) -> Result<()> {
        let runners: Vec<Arc<SystemRunner>> = self.systems.read().values().cloned().collect();
        debug!(systems = runners.len(), "scheduler tick");

        let results = join_all(runners.iter().map(|runner| runner.tick(&self.registry))).await;

        let mut first = None;
        for (runner, result) in runners.iter().zip(results) {
            if let Err(err) = result {
                let message = format!("{err:#}");
                warn!(system = %runner.system().id(), error = %message, "system tick failed");
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for SystemScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemScheduler")
            .field("systems", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use engine_component::{Component, EntityId};
    use engine_state::StateContext;
    use serde::{Deserialize, Serialize};
    use tokio::sync::Notify;

    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Solid {
        mass: f32,
    }

    impl Component for Solid {
        fn type_name() -> &'static str {
            "solid"
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Rendered {
        mesh: String,
    }

    impl Component for Rendered {
        fn type_name() -> &'static str {
            "rendered"
        }
    }

    fn scheduler() -> (ComponentRegistry, SystemScheduler) {
        let registry = ComponentRegistry::new(&StateContext::new());
        let scheduler = SystemScheduler::new(&registry);
        (registry, scheduler)
    }

    fn counting(kind: &str, count: &Arc<AtomicUsize>) -> System {
        let count = Arc::clone(count);
        System::new(kind).on_update(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
    }

    #[tokio::test]
    async fn test_register_and_unregister() {
        let (_registry, scheduler) = scheduler();
        let count = Arc::new(AtomicUsize::new(0));
        let id = scheduler.register(counting("solid", &count));
        assert_eq!(scheduler.len(), 1);

        scheduler.tick().await.unwrap();
        assert!(scheduler.unregister(id));
        assert!(!scheduler.unregister(id));
        scheduler.tick().await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_empty());
    }

    #[tokio::test]
    async fn test_system_without_callbacks_is_legal() {
        let (registry, scheduler) = scheduler();
        registry.create(EntityId(1), Solid { mass: 1.0 }).unwrap();
        let id = scheduler.register(System::of::<Solid>());
        scheduler.tick().await.unwrap();
        assert!(scheduler.contains(id));
    }

    #[tokio::test]
    async fn test_systems_run_concurrently() {
        let (_registry, scheduler) = scheduler();
        let notify = Arc::new(Notify::new());
        let waiter = Arc::clone(&notify);
        let notifier = Arc::clone(&notify);

        // The first system can only finish once the second one has started.
        scheduler.register(System::new("a").on_update(move |_| {
            let waiter = Arc::clone(&waiter);
            async move {
                waiter.notified().await;
                Ok(())
            }
        }));
        scheduler.register(System::new("b").on_update(move |_| {
            notifier.notify_one();
            async { Ok(()) }
        }));

        tokio::time::timeout(Duration::from_secs(5), scheduler.tick())
            .await
            .expect("systems did not run concurrently")
            .unwrap();
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_other_systems() {
        let (_registry, scheduler) = scheduler();
        let count = Arc::new(AtomicUsize::new(0));
        scheduler.register(System::new("broken").on_update(|_| async { anyhow::bail!("no backend") }));
        scheduler.register(counting("fine", &count));

        let err = scheduler.tick().await.unwrap_err();
        assert!(format!("{err:#}").contains("no backend"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_each_system_sees_only_its_kind() {
        let (registry, scheduler) = scheduler();
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&seen);
        scheduler.register(System::of::<Solid>().on_added(move |added| {
            sink.fetch_add(added.len(), Ordering::SeqCst);
            async { Ok(()) }
        }));
        registry.create(EntityId(1), Solid { mass: 1.0 }).unwrap();
        registry.create(EntityId(2), Solid { mass: 2.0 }).unwrap();
        registry
            .create(EntityId(2), Rendered { mesh: "cube".into() })
            .unwrap();

        scheduler.tick().await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
