//! Core [`Component`] trait, identities, and the typed component handle.
//!
//! A component kind is a Rust type with a string tag (`"positioned"`,
//! `"rendered"`, …). The registry only sees the tag and ids; the value itself
//! lives in the key store under `component.<id>` and is read and written
//! through a [`ComponentHandle`].
//!
//! ## Kind identity
//!
//! [`ComponentTypeId`] is the FNV-1a 64-bit hash of the tag, so the same tag
//! always maps to the same id without any registration step.

use std::fmt;
use std::sync::Arc;

use engine_state::{Change, ObservableValue, Subscription};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::EntityId;
use crate::error::ComponentError;
use crate::registry::ComponentRegistry;

/// Identifies a component kind. Derived from the kind's tag with FNV-1a.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Hash a kind tag.
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// The id for component kind `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self::from_name(T::type_name())
    }
}

/// Globally unique identity of one component record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub Uuid);

impl ComponentId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The contract every component kind satisfies.
///
/// # Examples
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use engine_component::Component;
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     fn type_name() -> &'static str { "health" }
/// }
/// ```
pub trait Component: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The kind tag systems dispatch on.
    fn type_name() -> &'static str;

    /// The [`ComponentTypeId`] of this kind.
    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }
}

/// One row of the registry: identity, owner and kind, without the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRecord {
    /// Unique record id.
    pub id: ComponentId,
    /// The entity the component belongs to.
    pub entity: EntityId,
    /// Hash of [`kind`](Self::kind).
    pub type_id: ComponentTypeId,
    /// The kind tag.
    pub kind: Arc<str>,
}

impl ComponentRecord {
    /// Returns `true` if this record holds a `T`.
    #[must_use]
    pub fn is<T: Component>(&self) -> bool {
        self.type_id == T::component_type_id()
    }
}

/// A typed view of one registered component.
///
/// Reads and writes go through an [`ObservableValue`], so a component's value
/// changes are observable with the same equality rule as any other value.
pub struct ComponentHandle<T> {
    record: ComponentRecord,
    value: ObservableValue<T>,
    registry: ComponentRegistry,
}

impl<T: Component> ComponentHandle<T> {
    pub(crate) fn new(record: ComponentRecord, value: ObservableValue<T>, registry: ComponentRegistry) -> Self {
        Self {
            record,
            value,
            registry,
        }
    }

    /// The record id.
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.record.id
    }

    /// The owning entity.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.record.entity
    }

    /// The registry row this handle views.
    #[must_use]
    pub fn record(&self) -> &ComponentRecord {
        &self.record
    }

    /// The current value. After deletion this is the value the component was
    /// created with.
    #[must_use]
    pub fn get(&self) -> T {
        self.value.get()
    }

    /// Replace the value, notifying listeners if it changed.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::NotRegistered`] once the record has been
    /// deleted (nothing is written), or [`ComponentError::State`] if the
    /// value cannot be encoded.
    pub fn set(&self, value: T) -> Result<T, ComponentError> {
        if !self.is_registered() {
            return Err(ComponentError::NotRegistered(self.record.id));
        }
        Ok(self.value.set(value)?)
    }

    /// Read, transform and write back the value.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub fn update(&self, f: impl FnOnce(T) -> T) -> Result<T, ComponentError> {
        self.set(f(self.get()))
    }

    /// Listen for value changes.
    pub fn on_changed<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Change<T>) + Send + Sync + 'static,
    {
        self.value.on_changed(callback)
    }

    /// Returns `true` while the record is still registered.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.registry.get(self.record.id).is_some()
    }

    /// Remove this component from the registry. A second call is a no-op
    /// returning `false`.
    pub fn delete(&self) -> bool {
        self.registry.delete(self.record.id)
    }
}

impl<T: Clone> Clone for ComponentHandle<T> {
    fn clone(&self) -> Self {
        Self {
            record: self.record.clone(),
            value: self.value.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<T> fmt::Debug for ComponentHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}
