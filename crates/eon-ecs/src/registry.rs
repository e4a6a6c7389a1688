//! The [`Registry`] is the single authority over entity identity, component
//! storage, and system membership.
//!
//! # Lifecycle
//!
//! Creating and killing entities is two-phase. [`create_entity`] makes the
//! entity active at once (components can be attached, it shows up in
//! [`entities`]) but no system sees it until the next [`update`].
//! [`kill_entity`] only queues the kill; pools, systems, tags and groups are
//! untouched until [`update`]. Systems can therefore create and kill
//! entities while iterating their own members.
//!
//! # Matching
//!
//! An entity `e` is a member of system `s` iff
//! `signature(e) & required(s) == required(s)` as of the flush that last
//! evaluated the pair. Under [`MembershipPolicy::ResyncOnFlush`] every flush
//! re-evaluates entities whose signature changed since the previous flush
//! and, after a system was added, every active entity.
//!
//! [`create_entity`]: Registry::create_entity
//! [`kill_entity`]: Registry::kill_entity
//! [`entities`]: Registry::entities
//! [`update`]: Registry::update

use std::any::TypeId;
use std::collections::{BTreeSet, HashMap};

use tracing::{debug, trace, warn};

use crate::config::{DuplicateSystemPolicy, MembershipPolicy, RegistryConfig};
use crate::entity::{Entity, EntityAllocator, EntityMut, EntityRef};
use crate::index::{GroupIndex, TagIndex};
use crate::pool::{AnyPool, Pool};
use crate::signature::{ComponentTypeId, ComponentTypes, Signature};
use crate::system::{Requirements, System, SystemState};
use crate::EcsError;

/// Unwrap a registry result, panicking with the error's diagnostic.
#[track_caller]
fn expect_ok<T>(result: Result<T, EcsError>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => panic!("{e}"),
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Owner of all pools, systems, signatures and secondary indices.
pub struct Registry {
    config: RegistryConfig,
    component_types: ComponentTypes,
    /// Indexed by `ComponentTypeId`; `None` until the first value of that type.
    pools: Vec<Option<Box<dyn AnyPool>>>,
    /// Indexed by entity ID. Entries of dead IDs are empty.
    signatures: Vec<Signature>,
    systems: HashMap<TypeId, SystemState>,
    /// Active entities (created and not yet flushed as killed).
    entities: BTreeSet<Entity>,
    pending_add: BTreeSet<Entity>,
    pending_kill: BTreeSet<Entity>,
    /// Entities whose membership must be re-evaluated at the next flush.
    pending_resync: BTreeSet<Entity>,
    allocator: EntityAllocator,
    tags: TagIndex,
    groups: GroupIndex,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entity_count", &self.entities.len())
            .field("pending_add", &self.pending_add.len())
            .field("pending_kill", &self.pending_kill.len())
            .field("ids_allocated", &self.allocator.high_water_mark())
            .field("free_ids", &self.allocator.free_count())
            .field("component_types", &self.component_types.len())
            .field("system_count", &self.systems.len())
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry with the default [`RegistryConfig`].
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry.
    pub fn with_config(config: RegistryConfig) -> Self {
        debug!(?config, "registry created");
        Self {
            config,
            component_types: ComponentTypes::new(),
            pools: Vec::new(),
            signatures: Vec::new(),
            systems: HashMap::new(),
            entities: BTreeSet::new(),
            pending_add: BTreeSet::new(),
            pending_kill: BTreeSet::new(),
            pending_resync: BTreeSet::new(),
            allocator: EntityAllocator::new(),
            tags: TagIndex::default(),
            groups: GroupIndex::default(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The component type registry shared by pools, entities and systems.
    pub fn component_types(&self) -> &ComponentTypes {
        &self.component_types
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Create an entity.
    ///
    /// Reuses the oldest freed ID if there is one. The entity is active
    /// immediately but joins systems only at the next [`update`](Self::update).
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.allocator.allocate();
        let index = entity.index();
        if index >= self.signatures.len() {
            self.signatures.resize(index + 1, Signature::EMPTY);
        }
        self.signatures[index] = Signature::EMPTY;
        self.pending_add.insert(entity);
        self.entities.insert(entity);
        debug!(entity = %entity, "entity created");
        entity
    }

    /// Queue `entity` for destruction at the next [`update`](Self::update).
    ///
    /// Repeated calls before the flush are no-ops, as is killing an entity
    /// that is not active.
    pub fn kill_entity(&mut self, entity: Entity) {
        if !self.entities.contains(&entity) {
            trace!(entity = %entity, "kill of inactive entity ignored");
            return;
        }
        if self.pending_kill.insert(entity) {
            trace!(entity = %entity, "entity queued for kill");
        }
    }

    /// Flush pending creations, signature changes and kills.
    ///
    /// Run once per frame before systems execute.
    pub fn update(&mut self) {
        let added = std::mem::take(&mut self.pending_add);
        for &entity in &added {
            self.add_entity_to_systems(entity);
        }

        let resync = std::mem::take(&mut self.pending_resync);
        if self.config.membership == MembershipPolicy::ResyncOnFlush {
            for &entity in &resync {
                if self.entities.contains(&entity) {
                    self.resync_entity(entity);
                }
            }
        }

        let killed = std::mem::take(&mut self.pending_kill);
        if !killed.is_empty() {
            for state in self.systems.values_mut() {
                state.remove_entities(&killed);
            }
        }
        for &entity in &killed {
            self.signatures[entity.index()].reset();
            for pool in self.pools.iter_mut().flatten() {
                pool.remove_entity(entity);
            }
            self.allocator.release(entity);
            self.tags.remove(entity);
            self.groups.remove(entity);
            self.entities.remove(&entity);
            debug!(entity = %entity, "entity killed");
        }

        if !(added.is_empty() && resync.is_empty() && killed.is_empty()) {
            debug!(
                added = added.len(),
                resynced = resync.len(),
                killed = killed.len(),
                active = self.entities.len(),
                "registry flushed"
            );
        }
    }

    /// Kill every active entity and flush immediately.
    ///
    /// Entities created since the last flush are discarded without ever
    /// joining a system. Component types, pools and systems stay registered.
    pub fn clear(&mut self) {
        let discarded = self.pending_add.len();
        self.pending_add.clear();
        self.pending_resync.clear();
        for state in self.systems.values_mut() {
            state.clear_entities();
        }
        for pool in self.pools.iter_mut().flatten() {
            pool.clear();
        }
        self.pending_kill.extend(self.entities.iter().copied());
        debug!(
            active = self.entities.len(),
            discarded, "registry cleared"
        );
        self.update();
    }

    /// Whether `entity` is active.
    pub fn is_active(&self, entity: Entity) -> bool {
        self.entities.contains(&entity)
    }

    /// Whether `entity` is queued for the next kill flush.
    pub fn is_pending_kill(&self, entity: Entity) -> bool {
        self.pending_kill.contains(&entity)
    }

    /// Whether `entity` was created since the last flush.
    pub fn is_pending_add(&self, entity: Entity) -> bool {
        self.pending_add.contains(&entity)
    }

    /// All active entities, ordered by ID.
    pub fn entities(&self) -> &BTreeSet<Entity> {
        &self.entities
    }

    /// Number of active entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// The component signature of `entity`. Empty for dead or unknown IDs.
    pub fn entity_signature(&self, entity: Entity) -> Signature {
        self.signatures
            .get(entity.index())
            .copied()
            .unwrap_or_default()
    }

    /// Borrow `entity` mutably together with this registry.
    pub fn entity_mut(&mut self, entity: Entity) -> EntityMut<'_> {
        EntityMut::new(self, entity)
    }

    /// Borrow `entity` together with this registry.
    pub fn entity_ref(&self, entity: Entity) -> EntityRef<'_> {
        EntityRef::new(self, entity)
    }

    // -- components ---------------------------------------------------------

    /// Attach `value` to `entity`, overwriting an existing `T`.
    ///
    /// System membership does not change before the next flush, and under
    /// [`MembershipPolicy::LifecycleOnly`] not at all.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not active, or if `T` would be one component
    /// type more than [`MAX_COMPONENTS`](crate::signature::MAX_COMPONENTS).
    #[track_caller]
    pub fn add_component<T: 'static>(&mut self, entity: Entity, value: T) {
        expect_ok(self.try_add_component(entity, value));
    }

    /// Fallible form of [`add_component`](Self::add_component).
    pub fn try_add_component<T: 'static>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<(), EcsError> {
        self.ensure_active(entity)?;
        let id = self.component_types.register::<T>()?;
        self.pool_or_insert::<T>(id).set(entity, value);
        self.signatures[entity.index()].set(id);
        self.mark_signature_changed(entity);
        trace!(
            entity = %entity,
            component = std::any::type_name::<T>(),
            "component added"
        );
        Ok(())
    }

    /// Detach `T` from `entity` and return it. `None` if it had no `T`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not active.
    #[track_caller]
    pub fn remove_component<T: 'static>(&mut self, entity: Entity) -> Option<T> {
        expect_ok(self.try_remove_component(entity))
    }

    /// Fallible form of [`remove_component`](Self::remove_component).
    pub fn try_remove_component<T: 'static>(
        &mut self,
        entity: Entity,
    ) -> Result<Option<T>, EcsError> {
        self.ensure_active(entity)?;
        let Some(id) = self.component_types.id_of::<T>() else {
            return Ok(None);
        };
        if !self.signatures[entity.index()].test(id) {
            trace!(
                entity = %entity,
                component = std::any::type_name::<T>(),
                "remove of absent component ignored"
            );
            return Ok(None);
        }
        let pool = self.pool_mut::<T>(id).ok_or(EcsError::NotInPool {
            entity,
            component: std::any::type_name::<T>(),
        })?;
        let value = pool.try_remove(entity)?;
        // Clear the bit only once the value is really gone.
        self.signatures[entity.index()].unset(id);
        self.mark_signature_changed(entity);
        trace!(
            entity = %entity,
            component = std::any::type_name::<T>(),
            "component removed"
        );
        Ok(Some(value))
    }

    /// Whether `entity` carries a `T`. Only tests the signature bit.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not active.
    #[track_caller]
    pub fn has_component<T: 'static>(&self, entity: Entity) -> bool {
        expect_ok(self.try_has_component::<T>(entity))
    }

    /// Fallible form of [`has_component`](Self::has_component).
    pub fn try_has_component<T: 'static>(&self, entity: Entity) -> Result<bool, EcsError> {
        self.ensure_active(entity)?;
        Ok(self
            .component_types
            .id_of::<T>()
            .is_some_and(|id| self.signatures[entity.index()].test(id)))
    }

    /// Borrow the `T` attached to `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not active or has no `T`. Guard with
    /// [`has_component`](Self::has_component).
    #[track_caller]
    pub fn get_component<T: 'static>(&self, entity: Entity) -> &T {
        expect_ok(self.try_get_component(entity))
    }

    /// Fallible form of [`get_component`](Self::get_component).
    pub fn try_get_component<T: 'static>(&self, entity: Entity) -> Result<&T, EcsError> {
        self.component_id_on::<T>(entity)?;
        self.pool::<T>()
            .ok_or(EcsError::MissingComponent {
                entity,
                component: std::any::type_name::<T>(),
            })?
            .try_get(entity)
    }

    /// Mutably borrow the `T` attached to `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not active or has no `T`.
    #[track_caller]
    pub fn get_component_mut<T: 'static>(&mut self, entity: Entity) -> &mut T {
        expect_ok(self.try_get_component_mut(entity))
    }

    /// Fallible form of [`get_component_mut`](Self::get_component_mut).
    pub fn try_get_component_mut<T: 'static>(
        &mut self,
        entity: Entity,
    ) -> Result<&mut T, EcsError> {
        let id = self.component_id_on::<T>(entity)?;
        self.pool_mut::<T>(id)
            .ok_or(EcsError::MissingComponent {
                entity,
                component: std::any::type_name::<T>(),
            })?
            .try_get_mut(entity)
    }

    /// The pool holding every `T`, if any `T` was ever added.
    pub fn pool<T: 'static>(&self) -> Option<&Pool<T>> {
        let id = self.component_types.id_of::<T>()?;
        self.pools
            .get(id.index())?
            .as_ref()?
            .as_any()
            .downcast_ref::<Pool<T>>()
    }

    /// Number of live `T` values.
    pub fn pool_len<T: 'static>(&self) -> usize {
        self.pool::<T>().map_or(0, Pool::len)
    }

    // -- systems ------------------------------------------------------------

    /// Register a system.
    ///
    /// Returns `false` when a system of the same type is already registered
    /// and the policy is [`DuplicateSystemPolicy::Reject`]; the existing
    /// system is kept.
    ///
    /// # Panics
    ///
    /// Panics if the system's requirements exhaust the component capacity.
    #[track_caller]
    pub fn add_system<S: System>(&mut self, system: S) -> bool {
        match self.try_add_system(system) {
            Ok(()) => true,
            Err(e @ EcsError::DuplicateSystem { .. }) => {
                warn!(error = %e, "duplicate system registration rejected");
                false
            }
            Err(e) => panic!("{e}"),
        }
    }

    /// Fallible form of [`add_system`](Self::add_system).
    pub fn try_add_system<S: System>(&mut self, system: S) -> Result<(), EcsError> {
        let type_id = TypeId::of::<S>();
        let name = std::any::type_name::<S>();
        if self.systems.contains_key(&type_id)
            && self.config.duplicate_system == DuplicateSystemPolicy::Reject
        {
            return Err(EcsError::DuplicateSystem { system: name });
        }

        let mut requirements = Requirements::new(&mut self.component_types);
        system.require(&mut requirements);
        let signature = requirements.finish()?;

        if self
            .systems
            .insert(type_id, SystemState::new(system, signature))
            .is_some()
        {
            debug!(system = name, "system replaced");
        }

        if self.config.membership == MembershipPolicy::ResyncOnFlush {
            let settled = self
                .entities
                .iter()
                .filter(|e| !self.pending_add.contains(*e))
                .copied();
            self.pending_resync.extend(settled);
        }

        debug!(system = name, ?signature, "system registered");
        Ok(())
    }

    /// Unregister system `S` and return it. `None` if it was not registered
    /// (or is currently lent out by [`with_system`](Self::with_system)).
    pub fn remove_system<S: System>(&mut self) -> Option<S> {
        let Some(mut state) = self.systems.remove(&TypeId::of::<S>()) else {
            trace!(
                system = std::any::type_name::<S>(),
                "remove of unregistered system ignored"
            );
            return None;
        };
        debug!(system = state.name(), "system removed");
        state.take_behavior::<S>().map(|boxed| *boxed)
    }

    /// Whether a system of type `S` is registered.
    pub fn has_system<S: System>(&self) -> bool {
        self.systems.contains_key(&TypeId::of::<S>())
    }

    /// Borrow system `S`.
    ///
    /// # Panics
    ///
    /// Panics if `S` is not registered.
    #[track_caller]
    pub fn get_system<S: System>(&self) -> &S {
        expect_ok(self.try_get_system())
    }

    /// Fallible form of [`get_system`](Self::get_system).
    pub fn try_get_system<S: System>(&self) -> Result<&S, EcsError> {
        self.systems
            .get(&TypeId::of::<S>())
            .and_then(SystemState::behavior::<S>)
            .ok_or(EcsError::SystemNotRegistered {
                system: std::any::type_name::<S>(),
            })
    }

    /// Mutably borrow system `S`.
    ///
    /// # Panics
    ///
    /// Panics if `S` is not registered.
    #[track_caller]
    pub fn get_system_mut<S: System>(&mut self) -> &mut S {
        expect_ok(
            self.systems
                .get_mut(&TypeId::of::<S>())
                .and_then(SystemState::behavior_mut::<S>)
                .ok_or(EcsError::SystemNotRegistered {
                    system: std::any::type_name::<S>(),
                }),
        )
    }

    /// Bookkeeping of system `S` (signature, members), if registered.
    pub fn system_state<S: System>(&self) -> Option<&SystemState> {
        self.systems.get(&TypeId::of::<S>())
    }

    /// Every registered system's bookkeeping, in no particular order.
    pub fn systems(&self) -> impl Iterator<Item = &SystemState> + '_ {
        self.systems.values()
    }

    /// Number of registered systems.
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Members of system `S`, in the order they joined.
    ///
    /// # Panics
    ///
    /// Panics if `S` is not registered.
    #[track_caller]
    pub fn system_entities<S: System>(&self) -> &[Entity] {
        expect_ok(self.try_system_state::<S>()).entities()
    }

    /// The required signature of system `S`.
    ///
    /// # Panics
    ///
    /// Panics if `S` is not registered.
    #[track_caller]
    pub fn system_signature<S: System>(&self) -> Signature {
        expect_ok(self.try_system_state::<S>()).signature()
    }

    /// Run `f` with system `S` and this registry both mutably borrowed.
    ///
    /// `S` is lifted out of the registry for the duration of the call, so
    /// `get_system::<S>()` inside `f` fails; its membership list stays in the
    /// registry and keeps being maintained by flushes. If `S` is removed or
    /// replaced inside `f`, the lent instance is dropped afterwards.
    ///
    /// # Panics
    ///
    /// Panics if `S` is not registered or is already lent out.
    #[track_caller]
    pub fn with_system<S: System, R>(&mut self, f: impl FnOnce(&mut S, &mut Registry) -> R) -> R {
        let type_id = TypeId::of::<S>();
        let mut system = expect_ok(
            self.systems
                .get_mut(&type_id)
                .and_then(SystemState::take_behavior::<S>)
                .ok_or(EcsError::SystemNotRegistered {
                    system: std::any::type_name::<S>(),
                }),
        );

        let result = f(&mut system, self);

        let restored = self
            .systems
            .get_mut(&type_id)
            .is_some_and(|state| state.restore_behavior(system));
        if !restored {
            trace!(
                system = std::any::type_name::<S>(),
                "system removed or replaced while lent out"
            );
        }
        result
    }

    // -- tags & groups --------------------------------------------------------

    /// Tag `entity`. Removed automatically when the entity's kill is flushed.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not active.
    #[track_caller]
    pub fn tag_entity(&mut self, entity: Entity, tag: &str) {
        expect_ok(self.ensure_active(entity));
        self.tags.insert(entity, tag);
    }

    /// Whether `tag` currently resolves to `entity`.
    pub fn entity_has_tag(&self, entity: Entity, tag: &str) -> bool {
        self.tags.has_tag(entity, tag)
    }

    /// The entity tagged `tag`, if any.
    pub fn entity_by_tag(&self, tag: &str) -> Option<Entity> {
        self.tags.entity(tag)
    }

    /// The most recent tag given to `entity` that no other entity has taken since.
    pub fn entity_tag(&self, entity: Entity) -> Option<&str> {
        self.tags.tag(entity)
    }

    /// Drop every tag resolving to `entity`. No-op if it has none.
    pub fn remove_entity_tag(&mut self, entity: Entity) -> bool {
        self.tags.remove(entity)
    }

    /// Put `entity` in `group`, leaving any previous group.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not active.
    #[track_caller]
    pub fn group_entity(&mut self, entity: Entity, group: &str) {
        expect_ok(self.ensure_active(entity));
        self.groups.insert(entity, group);
    }

    /// Whether `entity` is in `group`.
    pub fn entity_belongs_to_group(&self, entity: Entity, group: &str) -> bool {
        self.groups.belongs_to(entity, group)
    }

    /// The group of `entity`, if any.
    pub fn entity_group(&self, entity: Entity) -> Option<&str> {
        self.groups.group(entity)
    }

    /// Members of `group`, ordered by ID.
    ///
    /// # Panics
    ///
    /// Panics if no entity was ever put in `group`.
    #[track_caller]
    pub fn entities_by_group(&self, group: &str) -> Vec<Entity> {
        expect_ok(self.try_entities_by_group(group))
    }

    /// Fallible form of [`entities_by_group`](Self::entities_by_group).
    pub fn try_entities_by_group(&self, group: &str) -> Result<Vec<Entity>, EcsError> {
        Ok(self.groups.members(group)?.iter().copied().collect())
    }

    /// Take `entity` out of its group. No-op if it has none.
    pub fn remove_entity_group(&mut self, entity: Entity) -> bool {
        self.groups.remove(entity)
    }

    // -- internal helpers ---------------------------------------------------

    fn ensure_active(&self, entity: Entity) -> Result<(), EcsError> {
        if self.entities.contains(&entity) {
            Ok(())
        } else {
            Err(EcsError::InactiveEntity { entity })
        }
    }

    /// The ID of `T`, provided `entity` is active and carries a `T`.
    fn component_id_on<T: 'static>(&self, entity: Entity) -> Result<ComponentTypeId, EcsError> {
        self.ensure_active(entity)?;
        self.component_types
            .id_of::<T>()
            .filter(|id| self.signatures[entity.index()].test(*id))
            .ok_or(EcsError::MissingComponent {
                entity,
                component: std::any::type_name::<T>(),
            })
    }

    fn try_system_state<S: System>(&self) -> Result<&SystemState, EcsError> {
        self.systems
            .get(&TypeId::of::<S>())
            .ok_or(EcsError::SystemNotRegistered {
                system: std::any::type_name::<S>(),
            })
    }

    fn pool_mut<T: 'static>(&mut self, id: ComponentTypeId) -> Option<&mut Pool<T>> {
        self.pools
            .get_mut(id.index())?
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<Pool<T>>()
    }

    fn pool_or_insert<T: 'static>(&mut self, id: ComponentTypeId) -> &mut Pool<T> {
        let capacity = self.config.initial_pool_capacity;
        if self.pools.len() <= id.index() {
            self.pools.resize_with(id.index() + 1, || None);
        }
        self.pools[id.index()]
            .get_or_insert_with(|| Box::new(Pool::<T>::with_capacity(capacity)))
            .as_any_mut()
            .downcast_mut::<Pool<T>>()
            .expect("pool type matches its component type id")
    }

    fn mark_signature_changed(&mut self, entity: Entity) {
        if self.config.membership == MembershipPolicy::ResyncOnFlush
            && !self.pending_add.contains(&entity)
        {
            self.pending_resync.insert(entity);
        }
    }

    fn add_entity_to_systems(&mut self, entity: Entity) {
        let signature = self.signatures[entity.index()];
        for state in self.systems.values_mut() {
            if state.is_interested(signature) {
                state.add_entity(entity);
            }
        }
    }

    fn resync_entity(&mut self, entity: Entity) {
        let signature = self.signatures[entity.index()];
        for state in self.systems.values_mut() {
            match (state.is_interested(signature), state.contains(entity)) {
                (true, false) => state.add_entity(entity),
                (false, true) => state.remove_entity(entity),
                _ => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
