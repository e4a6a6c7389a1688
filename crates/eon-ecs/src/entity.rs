//! Entity identifiers, ID allocation, and borrowed entity handles.
//!
//! An [`Entity`] is nothing but an integer ID. IDs are unique among active
//! entities and are recycled after a kill is flushed: freed IDs wait in a
//! FIFO queue and are handed out again before any fresh ID.
//!
//! [`EntityMut`] and [`EntityRef`] pair an entity with a borrow of its
//! [`Registry`] so component and lifecycle calls can be chained on the
//! entity itself. They hold no state of their own.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::registry::Registry;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// Identity of an entity. Copyable; compared and ordered by ID.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Entity(u32);

impl Entity {
    /// Wrap a raw ID.
    #[inline]
    pub fn from_id(id: u32) -> Self {
        Self(id)
    }

    /// The raw ID.
    #[inline]
    pub fn id(self) -> u32 {
        self.0
    }

    /// The ID as a table index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Hands out entity IDs, reusing released ones first (FIFO).
#[derive(Debug, Default)]
pub(crate) struct EntityAllocator {
    /// Next never-used ID.
    next_id: u32,
    /// Released IDs waiting to be reused, oldest first.
    free_ids: VecDeque<u32>,
}

impl EntityAllocator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Allocate an ID: the oldest released one if any, else the next fresh one.
    pub(crate) fn allocate(&mut self) -> Entity {
        if let Some(id) = self.free_ids.pop_front() {
            return Entity(id);
        }
        let id = self.next_id;
        self.next_id += 1;
        Entity(id)
    }

    /// Return an ID to the free queue.
    pub(crate) fn release(&mut self, entity: Entity) {
        debug_assert!(entity.0 < self.next_id, "released an ID that was never allocated");
        self.free_ids.push_back(entity.0);
    }

    /// Number of distinct IDs ever allocated (the high-water mark).
    pub(crate) fn high_water_mark(&self) -> usize {
        self.next_id as usize
    }

    /// Number of IDs waiting to be reused.
    pub(crate) fn free_count(&self) -> usize {
        self.free_ids.len()
    }
}

// ---------------------------------------------------------------------------
// EntityMut / EntityRef
// ---------------------------------------------------------------------------

/// An entity together with a mutable borrow of its registry.
///
/// Obtained from [`Registry::entity_mut`]. Every method forwards to the
/// registry; see the registry methods of the same name for contracts.
pub struct EntityMut<'r> {
    registry: &'r mut Registry,
    entity: Entity,
}

impl<'r> EntityMut<'r> {
    pub(crate) fn new(registry: &'r mut Registry, entity: Entity) -> Self {
        Self { registry, entity }
    }

    /// The wrapped entity.
    pub fn id(&self) -> Entity {
        self.entity
    }

    /// Attach (or overwrite) a component.
    pub fn add_component<T: 'static>(&mut self, value: T) -> &mut Self {
        self.registry.add_component(self.entity, value);
        self
    }

    /// Detach a component, returning it if present.
    pub fn remove_component<T: 'static>(&mut self) -> Option<T> {
        self.registry.remove_component::<T>(self.entity)
    }

    pub fn has_component<T: 'static>(&self) -> bool {
        self.registry.has_component::<T>(self.entity)
    }

    pub fn get_component<T: 'static>(&self) -> &T {
        self.registry.get_component::<T>(self.entity)
    }

    pub fn get_component_mut<T: 'static>(&mut self) -> &mut T {
        self.registry.get_component_mut::<T>(self.entity)
    }

    /// Request destruction at the next flush.
    pub fn kill(&mut self) {
        self.registry.kill_entity(self.entity);
    }

    pub fn tag(&mut self, tag: &str) -> &mut Self {
        self.registry.tag_entity(self.entity, tag);
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.registry.entity_has_tag(self.entity, tag)
    }

    pub fn group(&mut self, group: &str) -> &mut Self {
        self.registry.group_entity(self.entity, group);
        self
    }

    pub fn belongs_to_group(&self, group: &str) -> bool {
        self.registry.entity_belongs_to_group(self.entity, group)
    }
}

impl fmt::Debug for EntityMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityMut").field(&self.entity).finish()
    }
}

/// An entity together with a shared borrow of its registry.
#[derive(Clone, Copy)]
pub struct EntityRef<'r> {
    registry: &'r Registry,
    entity: Entity,
}

impl<'r> EntityRef<'r> {
    pub(crate) fn new(registry: &'r Registry, entity: Entity) -> Self {
        Self { registry, entity }
    }

    pub fn id(&self) -> Entity {
        self.entity
    }

    pub fn has_component<T: 'static>(&self) -> bool {
        self.registry.has_component::<T>(self.entity)
    }

    pub fn get_component<T: 'static>(&self) -> &'r T {
        self.registry.get_component::<T>(self.entity)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.registry.entity_has_tag(self.entity, tag)
    }

    pub fn belongs_to_group(&self, group: &str) -> bool {
        self.registry.entity_belongs_to_group(self.entity, group)
    }

    pub fn tag(&self) -> Option<&'r str> {
        self.registry.entity_tag(self.entity)
    }

    pub fn group(&self) -> Option<&'r str> {
        self.registry.entity_group(self.entity)
    }
}

impl fmt::Debug for EntityRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityRef").field(&self.entity).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
