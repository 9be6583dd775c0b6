//! # engine_component
//!
//! The "C" in ECS: what a component is, how it is identified, and where
//! the records live.
//!
//! This crate provides:
//!
//! - [`Component`] trait: the contract every component kind satisfies.
//! - [`ComponentId`] / [`ComponentTypeId`]: record identity and kind identity.
//! - [`EntityId`] / [`EntityAllocator`]: lightweight entity identifiers.
//! - [`ComponentRegistry`]: the ordered, indexed list of component records.
//! - [`ComponentHandle`]: a typed, observable view of one record's value.
//! - [`Entity`]: a handle grouping the components that share an entity id.

pub mod component;
pub mod entity;
pub mod error;
pub mod registry;

pub use component::{Component, ComponentHandle, ComponentId, ComponentRecord, ComponentTypeId};
pub use entity::{Entity, EntityAllocator, EntityId};
pub use error::ComponentError;
pub use registry::ComponentRegistry;
