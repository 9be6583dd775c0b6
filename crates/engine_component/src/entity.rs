//! Entity identifiers and the entity handle.
//!
//! An entity has no storage of its own. It exists exactly as long as at least
//! one registered component carries its id; an entity with no components is
//! indistinguishable from one that never existed.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentHandle, ComponentRecord};
use crate::error::ComponentError;
use crate::registry::ComponentRegistry;

/// A unique entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Create an entity id from a raw `u64`.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64`.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Hands out monotonically increasing entity ids, starting at 1.
///
/// Ids from the allocator never repeat, but nothing stops callers from
/// attaching components to ids it did not produce.
#[derive(Debug)]
pub struct EntityAllocator {
    next_id: AtomicU64,
}

impl EntityAllocator {
    /// Creates a new allocator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates a fresh id.
    pub fn allocate(&self) -> EntityId {
        EntityId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the number of ids allocated so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - 1
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// A lightweight handle: an id plus the registry to look it up in.
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    registry: ComponentRegistry,
}

impl Entity {
    pub(crate) fn new(id: EntityId, registry: ComponentRegistry) -> Self {
        Self { id, registry }
    }

    /// The entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// All components of this entity, in registration order.
    #[must_use]
    pub fn components(&self) -> Vec<ComponentRecord> {
        self.registry.get_by_entity(self.id)
    }

    /// Returns `true` while at least one component carries this id.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.components().is_empty()
    }

    /// Returns `true` if the entity has a component of `kind`.
    #[must_use]
    pub fn has(&self, kind: &str) -> bool {
        self.registry.get_by_entity_and_type(self.id, kind).is_some()
    }

    /// The first component of kind `T`, if any.
    #[must_use]
    pub fn get<T: Component>(&self) -> Option<ComponentHandle<T>> {
        self.registry.find::<T>(self.id)
    }

    /// Attach a new component of kind `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::State`] if the value cannot be stored.
    pub fn insert<T: Component>(&self, value: T) -> Result<ComponentHandle<T>, ComponentError> {
        self.registry.create(self.id, value)
    }

    /// Remove every component of kind `T`. Returns how many were removed.
    pub fn remove<T: Component>(&self) -> usize {
        self.registry
            .delete_by_entity_and_type(self.id, T::type_name())
    }

    /// Remove every component of this entity. Returns how many were removed.
    pub fn delete(&self) -> usize {
        self.registry.delete_by_entity(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_produces_unique_ids() {
        let alloc = EntityAllocator::new();
        let e1 = alloc.allocate();
        let e2 = alloc.allocate();
        let e3 = alloc.allocate();
        assert_eq!(e1.raw(), 1);
        assert_eq!(e2.raw(), 2);
        assert_eq!(e3.raw(), 3);
        assert_eq!(alloc.count(), 3);
    }

    #[test]
    fn test_entity_display() {
        assert_eq!(EntityId::from_raw(7).to_string(), "Entity(7)");
    }
}
