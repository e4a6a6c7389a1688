//! Tag and group indices: semantic entity lookup independent of components.
//!
//! A tag names a single entity ("player"); a group names a set of entities
//! ("enemies"). Each entity belongs to at most one group.

use std::collections::{BTreeSet, HashMap};

use crate::entity::Entity;
use crate::EcsError;

// ---------------------------------------------------------------------------
// TagIndex
// ---------------------------------------------------------------------------

/// Map between tag strings and entities.
///
/// A tag string resolves to at most one entity. An entity may hold several
/// tag strings; the most recently assigned one is its current tag.
#[derive(Debug, Default)]
pub(crate) struct TagIndex {
    entity_per_tag: HashMap<String, Entity>,
    /// Tag strings resolving to each entity, oldest first.
    tags_per_entity: HashMap<Entity, Vec<String>>,
}

impl TagIndex {
    /// Tag `entity`. Re-tagging does not drop the previous tag string: it
    /// keeps resolving to `entity` until [`remove`](Self::remove) is called.
    /// A tag taken from another entity no longer belongs to that entity.
    pub(crate) fn insert(&mut self, entity: Entity, tag: &str) {
        if let Some(previous) = self.entity_per_tag.insert(tag.to_owned(), entity) {
            if previous != entity {
                tracing::warn!(
                    tag,
                    previous = %previous,
                    entity = %entity,
                    "tag reassigned to a different entity"
                );
                self.forget(previous, tag);
            }
        }
        let tags = self.tags_per_entity.entry(entity).or_default();
        tags.retain(|t| t != tag);
        tags.push(tag.to_owned());
    }

    /// Drop every tag string that resolves to `entity`. Returns whether any did.
    pub(crate) fn remove(&mut self, entity: Entity) -> bool {
        let Some(tags) = self.tags_per_entity.remove(&entity) else {
            return false;
        };
        for tag in &tags {
            self.entity_per_tag.remove(tag);
        }
        !tags.is_empty()
    }

    pub(crate) fn entity(&self, tag: &str) -> Option<Entity> {
        self.entity_per_tag.get(tag).copied()
    }

    /// The most recently assigned tag string still resolving to `entity`.
    pub(crate) fn tag(&self, entity: Entity) -> Option<&str> {
        self.tags_per_entity
            .get(&entity)
            .and_then(|tags| tags.last())
            .map(String::as_str)
    }

    pub(crate) fn has_tag(&self, entity: Entity, tag: &str) -> bool {
        self.entity_per_tag.get(tag) == Some(&entity)
    }

    fn forget(&mut self, entity: Entity, tag: &str) {
        if let Some(tags) = self.tags_per_entity.get_mut(&entity) {
            tags.retain(|t| t != tag);
            if tags.is_empty() {
                self.tags_per_entity.remove(&entity);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// GroupIndex
// ---------------------------------------------------------------------------

/// One-to-many map from group names to entities.
///
/// A group stays known (and empty) after its last member leaves.
#[derive(Debug, Default)]
pub(crate) struct GroupIndex {
    entities_per_group: HashMap<String, BTreeSet<Entity>>,
    group_per_entity: HashMap<Entity, String>,
}

impl GroupIndex {
    /// Put `entity` in `group`, leaving its previous group if it had one.
    pub(crate) fn insert(&mut self, entity: Entity, group: &str) {
        if let Some(previous) = self.group_per_entity.insert(entity, group.to_owned()) {
            if previous != group {
                if let Some(members) = self.entities_per_group.get_mut(&previous) {
                    members.remove(&entity);
                }
            }
        }
        self.entities_per_group
            .entry(group.to_owned())
            .or_default()
            .insert(entity);
    }

    /// Take `entity` out of its group. Returns whether it had one.
    pub(crate) fn remove(&mut self, entity: Entity) -> bool {
        let Some(group) = self.group_per_entity.remove(&entity) else {
            return false;
        };
        if let Some(members) = self.entities_per_group.get_mut(&group) {
            members.remove(&entity);
        }
        true
    }

    pub(crate) fn members(&self, group: &str) -> Result<&BTreeSet<Entity>, EcsError> {
        self.entities_per_group
            .get(group)
            .ok_or_else(|| EcsError::UnknownGroup {
                group: group.to_owned(),
            })
    }

    pub(crate) fn group(&self, entity: Entity) -> Option<&str> {
        self.group_per_entity.get(&entity).map(String::as_str)
    }

    pub(crate) fn belongs_to(&self, entity: Entity, group: &str) -> bool {
        self.entities_per_group
            .get(group)
            .is_some_and(|members| members.contains(&entity))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
