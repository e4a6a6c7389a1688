//! Systems and their interest signatures.
//!
//! A system declares which component types an entity must carry through
//! [`System::require`]. The registry turns those declarations into a required
//! [`Signature`] and keeps, per system, the list of entities that currently
//! match it ([`SystemState`]). Per-frame logic is up to the system itself;
//! see [`Registry::with_system`](crate::registry::Registry::with_system).

use std::any::Any;
use std::collections::BTreeSet;

use crate::entity::Entity;
use crate::signature::{ComponentTypes, Signature};
use crate::EcsError;

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// A behavior unit that processes every entity whose signature covers its
/// required signature.
pub trait System: Any {
    /// Declare required component types by calling
    /// [`Requirements::require`] zero or more times.
    ///
    /// Called once, when the system is added to a registry. A system that
    /// requires nothing matches every entity.
    fn require(&self, requirements: &mut Requirements<'_>);
}

// ---------------------------------------------------------------------------
// Requirements
// ---------------------------------------------------------------------------

/// Builder for a system's required signature.
///
/// Registers each required component type in the registry's
/// [`ComponentTypes`] so the bit positions agree with entity signatures.
pub struct Requirements<'a> {
    types: &'a mut ComponentTypes,
    signature: Signature,
    error: Option<EcsError>,
}

impl<'a> Requirements<'a> {
    pub(crate) fn new(types: &'a mut ComponentTypes) -> Self {
        Self {
            types,
            signature: Signature::new(),
            error: None,
        }
    }

    /// Require component type `T`.
    pub fn require<T: 'static>(&mut self) -> &mut Self {
        match self.types.register::<T>() {
            Ok(id) => self.signature.set(id),
            Err(e) => {
                // Keep the first failure; it is reported when the system is added.
                self.error.get_or_insert(e);
            }
        }
        self
    }

    /// The signature built so far.
    pub fn signature(&self) -> Signature {
        self.signature
    }

    pub(crate) fn finish(self) -> Result<Signature, EcsError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.signature),
        }
    }
}

// ---------------------------------------------------------------------------
// SystemState
// ---------------------------------------------------------------------------

/// Registry-owned bookkeeping for one registered system: its required
/// signature, its current members, and the system value itself.
pub struct SystemState {
    name: &'static str,
    signature: Signature,
    /// Members in insertion order.
    entities: Vec<Entity>,
    /// `None` while the system is lent out by `Registry::with_system`.
    behavior: Option<Box<dyn Any>>,
}

impl SystemState {
    pub(crate) fn new<S: System>(system: S, signature: Signature) -> Self {
        Self {
            name: std::any::type_name::<S>(),
            signature,
            entities: Vec::new(),
            behavior: Some(Box::new(system)),
        }
    }

    /// Rust type name of the system.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The required signature.
    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Current members, in the order they joined.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Whether an entity with `signature` belongs to this system.
    #[inline]
    pub fn is_interested(&self, signature: Signature) -> bool {
        signature.contains_all(self.signature)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains(&entity)
    }

    pub(crate) fn add_entity(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    /// Linear scan; keeps the relative order of the other members.
    pub(crate) fn remove_entity(&mut self, entity: Entity) {
        self.entities.retain(|e| *e != entity);
    }

    /// Drop every member contained in `killed`, keeping the order of the rest.
    pub(crate) fn remove_entities(&mut self, killed: &BTreeSet<Entity>) {
        self.entities.retain(|e| !killed.contains(e));
    }

    pub(crate) fn clear_entities(&mut self) {
        self.entities.clear();
    }

    pub(crate) fn behavior<S: System>(&self) -> Option<&S> {
        self.behavior.as_ref()?.downcast_ref::<S>()
    }

    pub(crate) fn behavior_mut<S: System>(&mut self) -> Option<&mut S> {
        self.behavior.as_mut()?.downcast_mut::<S>()
    }

    pub(crate) fn take_behavior<S: System>(&mut self) -> Option<Box<S>> {
        let boxed = self.behavior.take()?;
        match boxed.downcast::<S>() {
            Ok(system) => Some(system),
            Err(other) => {
                self.behavior = Some(other);
                None
            }
        }
    }

    /// Put a lent-out system back. Returns `false` if the slot is occupied.
    pub(crate) fn restore_behavior<S: System>(&mut self, system: Box<S>) -> bool {
        if self.behavior.is_some() {
            return false;
        }
        self.behavior = Some(system as Box<dyn Any>);
        true
    }
}

impl std::fmt::Debug for SystemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemState")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("entity_count", &self.entities.len())
            .field("lent_out", &self.behavior.is_none())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
