//! Component registry: every component record of one context.
//!
//! Records are kept in registration order in an index keyed by
//! [`ComponentId`], so lookup by id is O(1) and the multi-result queries
//! return records in the order they were created. The registry never holds
//! its lock while user code runs.
//!
//! Every delete is idempotent: removing something that is not there is a
//! no-op that reports zero removals.

use std::fmt;
use std::sync::Arc;

use engine_state::{ObservableValue, StateContext, channels};
use indexmap::IndexMap;
use indexmap::map::Entry;
use parking_lot::RwLock;
use tracing::debug;

use crate::component::{Component, ComponentHandle, ComponentId, ComponentRecord, ComponentTypeId};
use crate::entity::{Entity, EntityAllocator, EntityId};
use crate::error::ComponentError;

/// The ordered, indexed list of component records.
///
/// Cloning yields another handle to the same records.
#[derive(Clone)]
pub struct ComponentRegistry {
    state: StateContext,
    records: Arc<RwLock<IndexMap<ComponentId, ComponentRecord>>>,
    allocator: Arc<EntityAllocator>,
}

impl ComponentRegistry {
    /// Create an empty registry whose component values live in `state`.
    #[must_use]
    pub fn new(state: &StateContext) -> Self {
        Self {
            state: state.clone(),
            records: Arc::new(RwLock::new(IndexMap::new())),
            allocator: Arc::new(EntityAllocator::new()),
        }
    }

    /// The context component values are stored in.
    #[must_use]
    pub fn state(&self) -> &StateContext {
        &self.state
    }

    /// A handle for a freshly allocated entity id. The entity only becomes
    /// visible once a component is attached.
    #[must_use]
    pub fn spawn(&self) -> Entity {
        Entity::new(self.allocator.allocate(), self.clone())
    }

    /// A handle for an arbitrary entity id.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Entity {
        Entity::new(id, self.clone())
    }

    /// Register a new component of kind `T` for `entity` with a generated id.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::State`] if the value cannot be stored.
    pub fn create<T: Component>(
        &self,
        entity: EntityId,
        value: T,
    ) -> Result<ComponentHandle<T>, ComponentError> {
        self.create_with_id(ComponentId::generate(), entity, value)
    }

    /// Register a new component with a caller-supplied id.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::DuplicateId`] if `id` is already registered,
    /// or [`ComponentError::State`] if the value cannot be stored. Nothing is
    /// registered on error.
    pub fn create_with_id<T: Component>(
        &self,
        id: ComponentId,
        entity: EntityId,
        value: T,
    ) -> Result<ComponentHandle<T>, ComponentError> {
        let record = ComponentRecord {
            id,
            entity,
            type_id: T::component_type_id(),
            kind: Arc::from(T::type_name()),
        };

        match self.records.write().entry(id) {
            Entry::Occupied(_) => return Err(ComponentError::DuplicateId(id)),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
            }
        }

        let observable = ObservableValue::new(&self.state, channels::component_value(id), value.clone());
        if let Err(err) = observable.set(value) {
            self.records.write().shift_remove(&id);
            return Err(err.into());
        }

        debug!(%id, %entity, kind = T::type_name(), "component created");
        Ok(ComponentHandle::new(record, observable, self.clone()))
    }

    /// The record with `id`.
    #[must_use]
    pub fn get(&self, id: ComponentId) -> Option<ComponentRecord> {
        self.records.read().get(&id).cloned()
    }

    /// A typed handle for the record with `id`.
    ///
    /// Returns `Ok(None)` if no such record is registered.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::KindMismatch`] if the record is not a `T`, or
    /// [`ComponentError::State`] if its stored value does not decode as `T`.
    pub fn handle<T: Component>(
        &self,
        id: ComponentId,
    ) -> Result<Option<ComponentHandle<T>>, ComponentError> {
        let Some(record) = self.get(id) else {
            return Ok(None);
        };
        if !record.is::<T>() {
            return Err(ComponentError::KindMismatch {
                id,
                expected: T::type_name(),
                actual: record.kind.to_string(),
            });
        }
        self.typed(record)
    }

    /// The first component of kind `T` attached to `entity`.
    #[must_use]
    pub fn find<T: Component>(&self, entity: EntityId) -> Option<ComponentHandle<T>> {
        let record = self.get_by_entity_and_type(entity, T::type_name())?;
        self.typed(record).ok().flatten()
    }

    /// Typed handles for every component of kind `T`, in registration order.
    #[must_use]
    pub fn all<T: Component>(&self) -> Vec<ComponentHandle<T>> {
        self.get_by_type(T::type_name())
            .into_iter()
            .filter_map(|record| self.typed(record).ok().flatten())
            .collect()
    }

    /// Every component of `entity`, in registration order.
    #[must_use]
    pub fn get_by_entity(&self, entity: EntityId) -> Vec<ComponentRecord> {
        self.filtered(|r| r.entity == entity)
    }

    /// Every component of kind `kind`, in registration order.
    #[must_use]
    pub fn get_by_type(&self, kind: &str) -> Vec<ComponentRecord> {
        let type_id = ComponentTypeId::from_name(kind);
        self.filtered(|r| r.type_id == type_id)
    }

    /// The first component of kind `kind` attached to `entity`.
    #[must_use]
    pub fn get_by_entity_and_type(&self, entity: EntityId, kind: &str) -> Option<ComponentRecord> {
        let type_id = ComponentTypeId::from_name(kind);
        self.records
            .read()
            .values()
            .find(|r| r.entity == entity && r.type_id == type_id)
            .cloned()
    }

    /// Remove the record with `id`. Returns `false` if it was not registered.
    pub fn delete(&self, id: ComponentId) -> bool {
        let removed = self.records.write().shift_remove(&id).is_some();
        if removed {
            self.release(&[id]);
        }
        removed
    }

    /// Remove every component of `entity`. Returns how many were removed.
    pub fn delete_by_entity(&self, entity: EntityId) -> usize {
        self.delete_where(|r| r.entity == entity)
    }

    /// Remove every component of kind `kind`. Returns how many were removed.
    pub fn delete_by_type(&self, kind: &str) -> usize {
        let type_id = ComponentTypeId::from_name(kind);
        self.delete_where(|r| r.type_id == type_id)
    }

    /// Remove every component of kind `kind` on `entity`. Returns how many
    /// were removed.
    pub fn delete_by_entity_and_type(&self, entity: EntityId, kind: &str) -> usize {
        let type_id = ComponentTypeId::from_name(kind);
        self.delete_where(|r| r.entity == entity && r.type_id == type_id)
    }

    /// The distinct entity ids that currently own at least one component, in
    /// order of their first registered component.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityId> {
        let mut seen = indexmap::IndexSet::new();
        for record in self.records.read().values() {
            seen.insert(record.entity);
        }
        seen.into_iter().collect()
    }

    /// Returns the number of registered components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn typed<T: Component>(
        &self,
        record: ComponentRecord,
    ) -> Result<Option<ComponentHandle<T>>, ComponentError> {
        let key = channels::component_value(record.id);
        let Some(current) = self.state.store().get_as::<T>(&key)? else {
            return Ok(None);
        };
        let observable = ObservableValue::new(&self.state, key, current);
        Ok(Some(ComponentHandle::new(record, observable, self.clone())))
    }

    fn filtered(&self, predicate: impl Fn(&ComponentRecord) -> bool) -> Vec<ComponentRecord> {
        self.records
            .read()
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }

    fn delete_where(&self, predicate: impl Fn(&ComponentRecord) -> bool) -> usize {
        let mut removed = Vec::new();
        self.records.write().retain(|id, record| {
            let hit = predicate(record);
            if hit {
                removed.push(*id);
            }
            !hit
        });
        self.release(&removed);
        removed.len()
    }

    fn release(&self, ids: &[ComponentId]) {
        for id in ids {
            self.state.store().remove(&channels::component_value(id));
            debug!(%id, "component deleted");
        }
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("components", &self.len())
            .finish_non_exhaustive()
    }
}
