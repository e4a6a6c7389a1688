//! Sparse-set component storage.
//!
//! A [`Pool<T>`] keeps every `T` value in a dense, gap-free `Vec<T>` and uses
//! two translation tables to go from an [`Entity`] to its dense slot and
//! back. Removal moves the last value into the freed slot, so insert,
//! lookup and removal are all O(1) while iteration stays contiguous.
//!
//! The registry stores one pool per component type behind the narrow
//! [`AnyPool`] trait and recovers the concrete `Pool<T>` with a checked
//! downcast keyed by the same type ID that drives the entity signature.

use std::any::Any;
use std::collections::HashMap;

use crate::entity::Entity;
use crate::EcsError;

// ---------------------------------------------------------------------------
// AnyPool -- type-erased capabilities
// ---------------------------------------------------------------------------

/// The operations the registry needs on a pool without knowing its type.
pub trait AnyPool: Any {
    /// Drop the value stored for `entity`, if any.
    ///
    /// Returns `false` (and does nothing) when the pool never held it.
    fn remove_entity(&mut self, entity: Entity) -> bool;

    /// Whether a value is stored for `entity`.
    fn contains(&self, entity: Entity) -> bool;

    /// Drop every stored value.
    fn clear(&mut self);

    /// Number of stored values.
    fn len(&self) -> usize;

    /// Whether the pool is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rust type name of the stored component.
    fn component_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Dense storage for all values of one component type.
///
/// Invariant: `data.len() == dense_entities.len() == sparse.len()`, and for
/// every dense index `i`, `sparse[dense_entities[i]] == i`.
#[derive(Debug, Clone)]
pub struct Pool<T> {
    /// Component values, packed with no gaps.
    data: Vec<T>,
    /// Dense index -> owning entity.
    dense_entities: Vec<Entity>,
    /// Entity -> dense index.
    sparse: HashMap<Entity, usize>,
}

impl<T> Pool<T> {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty pool with room for `capacity` values before growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            dense_entities: Vec::with_capacity(capacity),
            sparse: HashMap::with_capacity(capacity),
        }
    }

    /// Store `value` for `entity`, overwriting any previous value in place.
    ///
    /// New values are appended to the dense array; the backing storage grows
    /// geometrically when full.
    pub fn set(&mut self, entity: Entity, value: T) {
        if let Some(&index) = self.sparse.get(&entity) {
            self.data[index] = value;
            return;
        }
        let index = self.data.len();
        self.data.push(value);
        self.dense_entities.push(entity);
        self.sparse.insert(entity, index);
    }

    /// Remove and return the value stored for `entity`.
    ///
    /// The last dense value is moved into the vacated slot, so iteration
    /// order changes.
    pub fn try_remove(&mut self, entity: Entity) -> Result<T, EcsError> {
        let index = self
            .sparse
            .remove(&entity)
            .ok_or_else(|| self.not_in_pool(entity))?;

        let value = self.data.swap_remove(index);
        self.dense_entities.swap_remove(index);

        // Fix up the entity that was moved into `index`, unless we removed the tail.
        if let Some(&moved) = self.dense_entities.get(index) {
            self.sparse.insert(moved, index);
        }
        Ok(value)
    }

    /// Remove and return the value stored for `entity`.
    ///
    /// # Panics
    ///
    /// Panics if the pool holds no value for `entity`.
    pub fn remove(&mut self, entity: Entity) -> T {
        self.try_remove(entity).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Borrow the value stored for `entity`.
    pub fn try_get(&self, entity: Entity) -> Result<&T, EcsError> {
        match self.sparse.get(&entity) {
            Some(&index) => Ok(&self.data[index]),
            None => Err(self.not_in_pool(entity)),
        }
    }

    /// Mutably borrow the value stored for `entity`.
    pub fn try_get_mut(&mut self, entity: Entity) -> Result<&mut T, EcsError> {
        match self.sparse.get(&entity) {
            Some(&index) => Ok(&mut self.data[index]),
            None => Err(self.not_in_pool(entity)),
        }
    }

    /// Borrow the value stored for `entity`.
    ///
    /// # Panics
    ///
    /// Panics if the pool holds no value for `entity`.
    pub fn get(&self, entity: Entity) -> &T {
        self.try_get(entity).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Mutably borrow the value stored for `entity`.
    ///
    /// # Panics
    ///
    /// Panics if the pool holds no value for `entity`.
    pub fn get_mut(&mut self, entity: Entity) -> &mut T {
        self.try_get_mut(entity).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Whether a value is stored for `entity`.
    #[inline]
    pub fn contains(&self, entity: Entity) -> bool {
        self.sparse.contains_key(&entity)
    }

    /// Number of stored values.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the pool is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of values the pool can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Drop every value and forget every entity.
    pub fn clear(&mut self) {
        self.data.clear();
        self.dense_entities.clear();
        self.sparse.clear();
    }

    /// The packed values in dense order.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// The packed values in dense order, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Owning entity of each dense slot.
    pub fn entities(&self) -> &[Entity] {
        &self.dense_entities
    }

    /// Iterate `(entity, value)` pairs in dense order.
    ///
    /// The order is not stable across removals.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.dense_entities.iter().copied().zip(self.data.iter())
    }

    /// Iterate `(entity, value)` pairs in dense order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> + '_ {
        self.dense_entities.iter().copied().zip(self.data.iter_mut())
    }

    fn not_in_pool(&self, entity: Entity) -> EcsError {
        EcsError::NotInPool {
            entity,
            component: std::any::type_name::<T>(),
        }
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> AnyPool for Pool<T> {
    fn remove_entity(&mut self, entity: Entity) -> bool {
        self.try_remove(entity).is_ok()
    }

    fn contains(&self, entity: Entity) -> bool {
        Pool::contains(self, entity)
    }

    fn clear(&mut self) {
        Pool::clear(self);
    }

    fn len(&self) -> usize {
        Pool::len(self)
    }

    fn component_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn e(id: u32) -> Entity {
        Entity::from_id(id)
    }

    /// Check the two translation tables agree with the dense arrays.
    fn assert_consistent<T>(pool: &Pool<T>) {
        assert_eq!(pool.data.len(), pool.dense_entities.len());
        assert_eq!(pool.data.len(), pool.sparse.len());
        for (index, entity) in pool.dense_entities.iter().enumerate() {
            assert_eq!(pool.sparse[entity], index);
        }
    }

    #[test]
    fn set_then_get() {
        let mut pool = Pool::new();
        pool.set(e(3), "three");
        pool.set(e(1), "one");
        assert_eq!(*pool.get(e(3)), "three");
        assert_eq!(*pool.get(e(1)), "one");
        assert_eq!(pool.len(), 2);
        assert_consistent(&pool);
    }

    #[test]
    fn set_overwrites_in_place() {
        let mut pool = Pool::new();
        pool.set(e(1), 10);
        pool.set(e(2), 20);
        pool.set(e(1), 11);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.as_slice(), &[11, 20]);
    }

    #[test]
    fn remove_middle_keeps_no_gaps() {
        let mut pool = Pool::new();
        pool.set(e(10), 10);
        pool.set(e(20), 20);
        pool.set(e(30), 30);

        assert_eq!(pool.remove(e(20)), 20);

        let mut remaining: Vec<_> = pool.entities().to_vec();
        remaining.sort();
        assert_eq!(remaining, vec![e(10), e(30)]);
        assert_eq!(pool.len(), 2);
        assert_eq!(*pool.get(e(30)), 30);
        assert_consistent(&pool);
    }

    #[test]
    fn remove_tail_and_only_element() {
        let mut pool = Pool::new();
        pool.set(e(1), 'a');
        pool.set(e(2), 'b');
        assert_eq!(pool.remove(e(2)), 'b');
        assert_consistent(&pool);
        assert_eq!(pool.remove(e(1)), 'a');
        assert!(pool.is_empty());
        assert_consistent(&pool);
    }

    #[test]
    fn try_remove_absent_is_error() {
        let mut pool: Pool<u8> = Pool::new();
        let err = pool.try_remove(e(4)).unwrap_err();
        assert!(matches!(err, EcsError::NotInPool { .. }));
    }

    #[test]
    #[should_panic(expected = "holds no value for entity 9")]
    fn get_absent_panics() {
        let pool: Pool<u8> = Pool::new();
        pool.get(e(9));
    }

    #[test]
    #[should_panic(expected = "holds no value")]
    fn remove_absent_panics() {
        let mut pool: Pool<u8> = Pool::new();
        pool.remove(e(9));
    }

    #[test]
    fn type_erased_remove_is_benign() {
        let mut pool: Box<dyn AnyPool> = Box::new(Pool::<u32>::new());
        assert!(!pool.remove_entity(e(1)));

        pool.as_any_mut()
            .downcast_mut::<Pool<u32>>()
            .unwrap()
            .set(e(1), 5);
        assert!(pool.contains(e(1)));
        assert!(pool.remove_entity(e(1)));
        assert!(pool.is_empty());
    }

    #[test]
    fn iteration_pairs_entities_with_values() {
        let mut pool = Pool::with_capacity(4);
        for id in 0..4 {
            pool.set(e(id), id * 100);
        }
        for (_, value) in pool.iter_mut() {
            *value += 1;
        }
        let pairs: Vec<_> = pool.iter().map(|(en, v)| (en.id(), *v)).collect();
        assert_eq!(pairs, vec![(0, 1), (1, 101), (2, 201), (3, 301)]);
    }

    #[test]
    fn clear_empties_everything() {
        let mut pool = Pool::new();
        pool.set(e(1), 1);
        pool.set(e(2), 2);
        pool.clear();
        assert!(pool.is_empty());
        assert!(!pool.contains(e(1)));
        assert_consistent(&pool);
    }
}
