//! # Component Storage
//!
//! Dense component storage with swap-compaction.
//!
//! The storage uses a packed array strategy:
//! - Live components occupy slots `[0, len)` with no holes
//! - Entity lookup is O(1) through a direct-indexed slot table
//! - Removal moves the last component into the hole
//! - Iteration is cache-friendly (contiguous memory)

use super::component::Component;
use super::entity::Entity;
use crate::error::{EcsError, EcsResult};
use std::any::{type_name, Any};

/// Slot table marker for "entity has no component here".
const VACANT: u32 = u32::MAX;

/// Type-erased view of a component store.
///
/// This is the only capability the world needs from a store without
/// knowing its component type: dropping an entity on destroy.
pub trait AnyStorage: Send + Sync {
    /// Removes the entity's component if it has one. Returns true if it did.
    fn on_entity_destroyed(&mut self, entity: Entity) -> bool;

    /// Returns true if the entity has a component in this store.
    fn contains(&self, entity: Entity) -> bool;

    /// Number of stored components.
    fn len(&self) -> usize;

    /// Returns true if the store holds no component.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the stored component type.
    fn component_name(&self) -> &'static str;

    /// Upcast for typed access.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for typed access.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Packed storage for a single component type.
///
/// This storage guarantees:
/// - `entity_to_slot` and `slot_to_entity` are mutual inverses over `[0, len)`
/// - No allocation after creation (the dense array is sized to capacity)
/// - O(1) insert, remove and lookup
///
/// # Type Parameters
///
/// * `C` - The component type to store
///
/// # Example
///
/// ```rust,ignore
/// let mut storage: ComponentStorage<Health> = ComponentStorage::new(10_000);
/// storage.insert(entity, Health(100))?;
/// ```
pub struct ComponentStorage<C: Component> {
    /// The dense array of components.
    dense: Vec<C>,
    /// Owner of each dense slot.
    slot_to_entity: Vec<Entity>,
    /// Dense slot per entity index, `VACANT` if absent.
    entity_to_slot: Box<[u32]>,
    /// Capacity (max entities).
    capacity: usize,
}

impl<C: Component> ComponentStorage<C> {
    /// Creates an empty store able to hold one component per entity.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of entities this storage can hold
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");

        Self {
            dense: Vec::with_capacity(capacity),
            slot_to_entity: Vec::with_capacity(capacity),
            entity_to_slot: vec![VACANT; capacity].into_boxed_slice(),
            capacity,
        }
    }

    /// Returns the capacity of this storage.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored components.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Returns true if no component is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Returns true if the entity has a component here.
    #[inline]
    #[must_use]
    pub fn has(&self, entity: Entity) -> bool {
        self.slot(entity).is_some()
    }

    /// Appends a component for the entity.
    ///
    /// # Arguments
    ///
    /// * `entity` - The owning entity
    /// * `component` - The component value
    ///
    /// # Errors
    ///
    /// Returns `DuplicateComponent` if the entity already has one, or
    /// `EntityOutOfRange` if the entity index exceeds the capacity.
    pub fn insert(&mut self, entity: Entity, component: C) -> EcsResult<()> {
        let index = self.check_range(entity)?;
        if self.entity_to_slot[index] != VACANT {
            return Err(EcsError::DuplicateComponent {
                entity,
                component: type_name::<C>(),
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let slot = self.dense.len() as u32;
        self.dense.push(component);
        self.slot_to_entity.push(entity);
        self.entity_to_slot[index] = slot;
        Ok(())
    }

    /// Removes the entity's component and returns it.
    ///
    /// The last component is moved into the freed slot so the array stays
    /// packed.
    ///
    /// # Errors
    ///
    /// Returns `MissingComponent` if the entity has no component here.
    pub fn remove(&mut self, entity: Entity) -> EcsResult<C> {
        let slot = self.slot(entity).ok_or(EcsError::MissingComponent {
            entity,
            component: type_name::<C>(),
        })?;

        let removed = self.dense.swap_remove(slot);
        self.slot_to_entity.swap_remove(slot);

        if let Some(&moved) = self.slot_to_entity.get(slot) {
            #[allow(clippy::cast_possible_truncation)]
            let new_slot = slot as u32;
            self.entity_to_slot[moved.index()] = new_slot;
        }
        self.entity_to_slot[entity.index()] = VACANT;
        Ok(removed)
    }

    /// Gets the entity's component.
    ///
    /// # Errors
    ///
    /// Returns `MissingComponent` if the entity has no component here.
    #[inline]
    pub fn get(&self, entity: Entity) -> EcsResult<&C> {
        match self.slot(entity) {
            Some(slot) => Ok(&self.dense[slot]),
            None => Err(self.missing(entity)),
        }
    }

    /// Gets the entity's component mutably.
    ///
    /// # Errors
    ///
    /// Returns `MissingComponent` if the entity has no component here.
    #[inline]
    pub fn get_mut(&mut self, entity: Entity) -> EcsResult<&mut C> {
        match self.slot(entity) {
            Some(slot) => Ok(&mut self.dense[slot]),
            None => Err(self.missing(entity)),
        }
    }

    /// Returns the packed components.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[C] {
        &self.dense
    }

    /// Returns the owners of the packed components, slot for slot.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.slot_to_entity
    }

    /// Iterates over components with their owners.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &C)> {
        self.slot_to_entity.iter().copied().zip(self.dense.iter())
    }

    /// Iterates mutably over components with their owners.
    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut C)> {
        self.slot_to_entity.iter().copied().zip(self.dense.iter_mut())
    }

    #[inline]
    fn slot(&self, entity: Entity) -> Option<usize> {
        match self.entity_to_slot.get(entity.index()) {
            Some(&slot) if slot != VACANT => Some(slot as usize),
            _ => None,
        }
    }

    fn check_range(&self, entity: Entity) -> EcsResult<usize> {
        let index = entity.index();
        if index < self.capacity {
            Ok(index)
        } else {
            Err(EcsError::EntityOutOfRange {
                entity,
                capacity: self.capacity,
            })
        }
    }

    fn missing(&self, entity: Entity) -> EcsError {
        EcsError::MissingComponent {
            entity,
            component: type_name::<C>(),
        }
    }
}

impl<C: Component> AnyStorage for ComponentStorage<C> {
    fn on_entity_destroyed(&mut self, entity: Entity) -> bool {
        self.has(entity) && self.remove(entity).is_ok()
    }

    fn contains(&self, entity: Entity) -> bool {
        self.has(entity)
    }

    fn len(&self) -> usize {
        self.dense.len()
    }

    fn component_name(&self) -> &'static str {
        type_name::<C>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    fn pos(x: f32) -> Position {
        Position { x, y: -x }
    }

    /// Checks that both index maps agree with each other.
    fn assert_consistent<C: Component>(storage: &ComponentStorage<C>) {
        assert_eq!(storage.dense.len(), storage.slot_to_entity.len());
        for (slot, entity) in storage.slot_to_entity.iter().enumerate() {
            assert_eq!(storage.entity_to_slot[entity.index()] as usize, slot);
        }
        let occupied = storage
            .entity_to_slot
            .iter()
            .filter(|slot| **slot != VACANT)
            .count();
        assert_eq!(occupied, storage.len());
    }

    #[test]
    fn test_storage_creation() {
        let storage: ComponentStorage<Position> = ComponentStorage::new(1000);
        assert_eq!(storage.capacity(), 1000);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_insert_get() {
        let mut storage = ComponentStorage::new(100);
        let entity = Entity::from_raw(50);

        storage.insert(entity, pos(1.0)).unwrap();
        assert_eq!(*storage.get(entity).unwrap(), pos(1.0));
        assert!(storage.has(entity));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_duplicate_insert() {
        let mut storage = ComponentStorage::new(4);
        let entity = Entity::from_raw(1);
        storage.insert(entity, pos(1.0)).unwrap();

        assert!(matches!(
            storage.insert(entity, pos(2.0)),
            Err(EcsError::DuplicateComponent { .. })
        ));
        assert_eq!(*storage.get(entity).unwrap(), pos(1.0));
    }

    #[test]
    fn test_out_of_range_insert() {
        let mut storage = ComponentStorage::new(4);
        assert!(matches!(
            storage.insert(Entity::from_raw(4), pos(0.0)),
            Err(EcsError::EntityOutOfRange { capacity: 4, .. })
        ));
    }

    #[test]
    fn test_swap_compaction() {
        let mut storage = ComponentStorage::new(8);
        let a = Entity::from_raw(0);
        let b = Entity::from_raw(3);
        let c = Entity::from_raw(5);
        storage.insert(a, pos(1.0)).unwrap();
        storage.insert(b, pos(2.0)).unwrap();
        storage.insert(c, pos(3.0)).unwrap();

        // Removing the first slot moves c into it
        assert_eq!(storage.remove(a).unwrap(), pos(1.0));
        assert_eq!(storage.entities(), &[c, b]);
        assert_eq!(*storage.get(c).unwrap(), pos(3.0));
        assert_eq!(*storage.get(b).unwrap(), pos(2.0));
        assert!(!storage.has(a));
        assert_consistent(&storage);
    }

    #[test]
    fn test_remove_last_slot() {
        let mut storage = ComponentStorage::new(8);
        let a = Entity::from_raw(0);
        let b = Entity::from_raw(1);
        storage.insert(a, pos(1.0)).unwrap();
        storage.insert(b, pos(2.0)).unwrap();

        storage.remove(b).unwrap();
        assert_eq!(storage.entities(), &[a]);
        assert_consistent(&storage);
    }

    #[test]
    fn test_remove_missing() {
        let mut storage: ComponentStorage<Position> = ComponentStorage::new(4);
        assert!(matches!(
            storage.remove(Entity::from_raw(2)),
            Err(EcsError::MissingComponent { .. })
        ));
    }

    #[test]
    fn test_erased_destroy_is_idempotent() {
        let mut storage = ComponentStorage::new(4);
        let entity = Entity::from_raw(2);
        storage.insert(entity, pos(1.0)).unwrap();

        let erased: &mut dyn AnyStorage = &mut storage;
        assert!(erased.on_entity_destroyed(entity));
        assert!(!erased.on_entity_destroyed(entity));
        assert!(erased.is_empty());
    }

    #[test]
    fn test_iter_mut() {
        let mut storage = ComponentStorage::new(4);
        storage.insert(Entity::from_raw(0), pos(1.0)).unwrap();
        storage.insert(Entity::from_raw(1), pos(2.0)).unwrap();

        for (_, position) in storage.iter_mut() {
            position.x *= 10.0;
        }

        let xs: Vec<f32> = storage.as_slice().iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![10.0, 20.0]);
    }
}
