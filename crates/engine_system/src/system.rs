//! System definition.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use engine_component::{Component, ComponentRecord};
use futures::FutureExt;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Callback receiving a set of component records.
pub type MembershipCallback =
    Arc<dyn Fn(Vec<ComponentRecord>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Unique identifier of a registered system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemId(pub Uuid);

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A per-frame observer bound to one component kind.
///
/// All three callbacks are optional; a system without any still tracks
/// membership.
#[derive(Clone)]
pub struct System {
    pub(crate) id: SystemId,
    pub(crate) kind: String,
    pub(crate) on_update: Option<MembershipCallback>,
    pub(crate) on_added: Option<MembershipCallback>,
    pub(crate) on_removed: Option<MembershipCallback>,
}

impl System {
    /// A system observing components tagged `kind`.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: SystemId(Uuid::new_v4()),
            kind: kind.into(),
            on_update: None,
            on_added: None,
            on_removed: None,
        }
    }

    /// A system observing components of kind `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self::new(T::type_name())
    }

    /// Called every tick with the full current membership.
    #[must_use]
    pub fn on_update<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(Vec<ComponentRecord>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_update = Some(wrap(callback));
        self
    }

    /// Called every tick with the components that joined since the last tick.
    #[must_use]
    pub fn on_added<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(Vec<ComponentRecord>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_added = Some(wrap(callback));
        self
    }

    /// Called every tick with the components that left since the last tick.
    #[must_use]
    pub fn on_removed<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(Vec<ComponentRecord>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_removed = Some(wrap(callback));
        self
    }

    /// The system id, assigned at construction.
    #[must_use]
    pub fn id(&self) -> SystemId {
        self.id
    }

    /// The component kind this system observes.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("on_update", &self.on_update.is_some())
            .field("on_added", &self.on_added.is_some())
            .field("on_removed", &self.on_removed.is_some())
            .finish()
    }
}

fn wrap<F, Fut>(callback: F) -> MembershipCallback
where
    F: Fn(Vec<ComponentRecord>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |records: Vec<ComponentRecord>| callback(records).boxed())
}
