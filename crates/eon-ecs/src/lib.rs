//! Eon ECS -- sparse-set Entity Component System with deferred lifecycle.
//!
//! This crate provides the entity/component/system runtime of the Eon Engine.
//! Components of each type live in their own [`Pool`](pool::Pool), a sparse
//! set that keeps values densely packed for cache-friendly iteration while
//! supporting O(1) insert, lookup and swap-removal by entity. Every entity
//! carries a [`Signature`](signature::Signature) bitset describing which
//! component types it owns, and every system declares the signature it
//! requires. The [`Registry`](registry::Registry) matches the two at each
//! flush.
//!
//! Entity creation and destruction are two-phase: requests are queued and
//! only applied when [`Registry::update`](registry::Registry::update) runs,
//! so systems can create or kill entities while iterating their members.
//!
//! # Quick Start
//!
//! ```
//! use eon_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Position { x: f32, y: f32 }
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Velocity { dx: f32, dy: f32 }
//!
//! struct MovementSystem;
//!
//! impl System for MovementSystem {
//!     fn require(&self, requirements: &mut Requirements<'_>) {
//!         requirements.require::<Position>().require::<Velocity>();
//!     }
//! }
//!
//! let mut registry = Registry::new();
//! registry.add_system(MovementSystem);
//!
//! let entity = registry.create_entity();
//! registry
//!     .entity_mut(entity)
//!     .add_component(Position { x: 0.0, y: 0.0 })
//!     .add_component(Velocity { dx: 1.0, dy: 0.0 });
//!
//! registry.update();
//!
//! assert_eq!(registry.system_entities::<MovementSystem>(), &[entity]);
//! assert_eq!(
//!     registry.get_component::<Position>(entity),
//!     &Position { x: 0.0, y: 0.0 }
//! );
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod entity;
pub mod index;
pub mod pool;
pub mod registry;
pub mod signature;
pub mod system;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
///
/// Most of these describe precondition violations. The panicking entry points
/// of the [`Registry`](registry::Registry) (`get_component`, `get_system`,
/// `entities_by_group`, ...) abort with the `Display` text of the matching
/// variant; the `try_*` variants hand it back to the caller instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// The entity's signature does not contain the requested component.
    #[error("entity {entity} has no component '{component}'")]
    MissingComponent {
        entity: entity::Entity,
        component: &'static str,
    },

    /// A pool was asked for a value it does not hold.
    #[error("pool '{component}' holds no value for entity {entity}")]
    NotInPool {
        entity: entity::Entity,
        component: &'static str,
    },

    /// The entity is not active (never created, or already killed and flushed).
    #[error("entity {entity} is not active")]
    InactiveEntity { entity: entity::Entity },

    /// No entity was ever grouped under this name.
    #[error("unknown group '{group}'")]
    UnknownGroup { group: String },

    /// The system type was never registered (or has been removed).
    #[error("system '{system}' is not registered")]
    SystemNotRegistered { system: &'static str },

    /// A system of this type is already registered.
    #[error("system '{system}' is already registered")]
    DuplicateSystem { system: &'static str },

    /// Registering one more component type would overflow the signature width.
    #[error("cannot register component '{component}': all {max} signature bits in use")]
    ComponentCapacityExceeded {
        component: &'static str,
        max: usize,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::{DuplicateSystemPolicy, MembershipPolicy, RegistryConfig};
    pub use crate::entity::{Entity, EntityMut, EntityRef};
    pub use crate::pool::{AnyPool, Pool};
    pub use crate::registry::Registry;
    pub use crate::signature::{ComponentTypeId, ComponentTypes, Signature, MAX_COMPONENTS};
    pub use crate::system::{Requirements, System, SystemState};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
