//! Component type identifiers and signature bitsets.
//!
//! Every component type gets a small integer [`ComponentTypeId`] the first
//! time the [`ComponentTypes`] registry sees it. That integer is both the
//! index of the type's pool and the bit position inside a [`Signature`].

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::ops::{BitAnd, BitOr};

use serde::{Deserialize, Serialize};

use crate::EcsError;

/// Maximum number of distinct component types a registry can track.
pub const MAX_COMPONENTS: usize = 32;

// Signatures are backed by a single `u32` word.
const _: () = assert!(MAX_COMPONENTS <= u32::BITS as usize);

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Small, stable identifier of a component type within one registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentTypeId(pub(crate) u32);

impl ComponentTypeId {
    /// The raw index (bit position / pool slot).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// Fixed-width bitset with one bit per component type.
///
/// Used both for "which components does this entity have" and "which
/// components does this system require".
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Signature(u32);

impl Signature {
    /// The signature with no bits set.
    pub const EMPTY: Signature = Signature(0);

    /// Create an empty signature.
    pub fn new() -> Self {
        Self::EMPTY
    }

    /// Set the bit for `id`.
    #[inline]
    pub fn set(&mut self, id: ComponentTypeId) {
        self.0 |= 1 << id.0;
    }

    /// Clear the bit for `id`.
    #[inline]
    pub fn unset(&mut self, id: ComponentTypeId) {
        self.0 &= !(1 << id.0);
    }

    /// Whether the bit for `id` is set.
    #[inline]
    pub fn test(self, id: ComponentTypeId) -> bool {
        self.0 & (1 << id.0) != 0
    }

    /// Clear every bit.
    #[inline]
    pub fn reset(&mut self) {
        self.0 = 0;
    }

    /// Whether no bit is set.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of bits set.
    #[inline]
    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// `true` iff every bit of `required` is also set in `self`
    /// (`self & required == required`).
    #[inline]
    pub fn contains_all(self, required: Signature) -> bool {
        self & required == required
    }

    /// The raw bit pattern.
    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Iterate over the component type IDs whose bits are set, lowest first.
    pub fn iter(self) -> impl Iterator<Item = ComponentTypeId> {
        (0..MAX_COMPONENTS as u32)
            .filter(move |&bit| self.0 & (1u32 << bit) != 0)
            .map(ComponentTypeId)
    }
}

impl BitAnd for Signature {
    type Output = Signature;

    fn bitand(self, rhs: Self) -> Self::Output {
        Signature(self.0 & rhs.0)
    }
}

impl BitOr for Signature {
    type Output = Signature;

    fn bitor(self, rhs: Self) -> Self::Output {
        Signature(self.0 | rhs.0)
    }
}

impl FromIterator<ComponentTypeId> for Signature {
    fn from_iter<I: IntoIterator<Item = ComponentTypeId>>(iter: I) -> Self {
        let mut sig = Signature::new();
        for id in iter {
            sig.set(id);
        }
        sig
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({:0width$b})", self.0, width = MAX_COMPONENTS)
    }
}

// ---------------------------------------------------------------------------
// ComponentTypes
// ---------------------------------------------------------------------------

/// Registry mapping Rust types to [`ComponentTypeId`]s.
///
/// IDs are handed out in first-use order starting at 0 and are never reused
/// for the lifetime of the registry.
#[derive(Debug, Default)]
pub struct ComponentTypes {
    by_type: HashMap<TypeId, ComponentTypeId>,
    /// Indexed by `ComponentTypeId.0`.
    names: Vec<&'static str>,
}

impl ComponentTypes {
    /// Create an empty type registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the ID of `T`, assigning the next free one if `T` is new.
    ///
    /// Fails with [`EcsError::ComponentCapacityExceeded`] once
    /// [`MAX_COMPONENTS`] types are registered.
    pub fn register<T: 'static>(&mut self) -> Result<ComponentTypeId, EcsError> {
        let rust_type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&rust_type_id) {
            return Ok(existing);
        }
        if self.names.len() >= MAX_COMPONENTS {
            return Err(EcsError::ComponentCapacityExceeded {
                component: std::any::type_name::<T>(),
                max: MAX_COMPONENTS,
            });
        }

        let id = ComponentTypeId(self.names.len() as u32);
        self.names.push(std::any::type_name::<T>());
        self.by_type.insert(rust_type_id, id);
        tracing::trace!(
            component = std::any::type_name::<T>(),
            id = id.0,
            "component type registered"
        );
        Ok(id)
    }

    /// Look up the ID of `T` without registering it.
    pub fn id_of<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// The Rust type name recorded for `id`.
    pub fn name(&self, id: ComponentTypeId) -> Option<&'static str> {
        self.names.get(id.index()).copied()
    }

    /// Number of registered component types.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no component type has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All registered `(id, type name)` pairs in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentTypeId, &'static str)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (ComponentTypeId(i as u32), *name))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Pos;
    struct Vel;

    #[test]
    fn ids_follow_first_use_order() {
        let mut types = ComponentTypes::new();
        let v = types.register::<Vel>().unwrap();
        let p = types.register::<Pos>().unwrap();
        assert_eq!(v.index(), 0);
        assert_eq!(p.index(), 1);
        assert_eq!(types.register::<Vel>().unwrap(), v);
        assert_eq!(types.len(), 2);
    }

    #[test]
    fn lookup_does_not_register() {
        let types = ComponentTypes::new();
        assert_eq!(types.id_of::<Pos>(), None);
        assert!(types.is_empty());
    }

    #[test]
    fn capacity_is_enforced() {
        struct Marker<const N: usize>;

        let mut types = ComponentTypes::new();
        macro_rules! register_all {
            ($($n:literal)*) => { $( types.register::<Marker<$n>>().unwrap(); )* };
        }
        register_all!(0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15);
        register_all!(16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31);
        assert_eq!(types.len(), MAX_COMPONENTS);

        let err = types.register::<Pos>().unwrap_err();
        assert!(matches!(
            err,
            EcsError::ComponentCapacityExceeded { max: MAX_COMPONENTS, .. }
        ));
        // Already-known types still resolve.
        assert!(types.register::<Marker<31>>().is_ok());
    }

    #[test]
    fn subset_matching() {
        let a = ComponentTypeId(0);
        let b = ComponentTypeId(3);
        let c = ComponentTypeId(31);

        let entity: Signature = [a, b, c].into_iter().collect();
        let required: Signature = [a, b].into_iter().collect();

        assert!(entity.contains_all(required));
        assert!(!required.contains_all(entity));
        assert!(entity.contains_all(Signature::EMPTY));
        assert_eq!(entity.count(), 3);
        assert_eq!(entity.iter().collect::<Vec<_>>(), vec![a, b, c]);
    }

    #[test]
    fn set_unset_reset() {
        let id = ComponentTypeId(5);
        let mut sig = Signature::new();
        sig.set(id);
        assert!(sig.test(id));
        sig.unset(id);
        assert!(!sig.test(id));
        sig.set(id);
        sig.reset();
        assert!(sig.is_empty());
    }
}
