//! # Component Types
//!
//! Any `Send + Sync + 'static` type can be a component. A component type
//! gets its dense index the first time it is registered with a world;
//! indices increase monotonically and are never reused.

use super::entity::Entity;
use super::signature::MAX_COMPONENTS;
use super::storage::{AnyStorage, ComponentStorage};
use crate::error::{EcsError, EcsResult};
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// Marker trait for component data.
pub trait Component: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Component for T {}

/// Dense index of a registered component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ComponentType(u8);

impl ComponentType {
    /// Creates a component type from its raw index.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    /// Returns the raw index.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Returns the index as `usize`.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component#{}", self.0)
    }
}

/// Statically-typed token for a registered component type.
///
/// Returned by [`World::register_component`](crate::World::register_component).
/// Accessing a store through a handle skips the type-id lookup.
pub struct ComponentHandle<C> {
    component_type: ComponentType,
    _marker: PhantomData<fn() -> C>,
}

impl<C> ComponentHandle<C> {
    /// Returns the dense index of the component type.
    #[inline]
    #[must_use]
    pub const fn component_type(self) -> ComponentType {
        self.component_type
    }
}

impl<C> Clone for ComponentHandle<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for ComponentHandle<C> {}

impl<C> fmt::Debug for ComponentHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("component_type", &self.component_type)
            .field("component", &type_name::<C>())
            .finish()
    }
}

/// Owns one store per registered component type.
pub(crate) struct ComponentRegistry {
    types: HashMap<TypeId, ComponentType>,
    storages: Vec<Box<dyn AnyStorage>>,
    capacity: usize,
}

impl ComponentRegistry {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            types: HashMap::new(),
            storages: Vec::new(),
            capacity,
        }
    }

    pub(crate) fn register<C: Component>(&mut self) -> EcsResult<ComponentHandle<C>> {
        let type_id = TypeId::of::<C>();
        if self.types.contains_key(&type_id) {
            return Err(EcsError::ComponentAlreadyRegistered(type_name::<C>()));
        }
        if self.storages.len() >= MAX_COMPONENTS {
            return Err(EcsError::TooManyComponentTypes {
                max: MAX_COMPONENTS,
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let component_type = ComponentType(self.storages.len() as u8);
        self.types.insert(type_id, component_type);
        self.storages
            .push(Box::new(ComponentStorage::<C>::new(self.capacity)));

        Ok(ComponentHandle {
            component_type,
            _marker: PhantomData,
        })
    }

    pub(crate) fn component_type<C: Component>(&self) -> EcsResult<ComponentType> {
        self.types
            .get(&TypeId::of::<C>())
            .copied()
            .ok_or(EcsError::ComponentNotRegistered(type_name::<C>()))
    }

    pub(crate) fn handle<C: Component>(&self) -> EcsResult<ComponentHandle<C>> {
        Ok(ComponentHandle {
            component_type: self.component_type::<C>()?,
            _marker: PhantomData,
        })
    }

    pub(crate) fn storage<C: Component>(
        &self,
        handle: ComponentHandle<C>,
    ) -> EcsResult<&ComponentStorage<C>> {
        self.storages
            .get(handle.component_type.index())
            .and_then(|storage| storage.as_any().downcast_ref())
            .ok_or(EcsError::ComponentNotRegistered(type_name::<C>()))
    }

    pub(crate) fn storage_mut<C: Component>(
        &mut self,
        handle: ComponentHandle<C>,
    ) -> EcsResult<&mut ComponentStorage<C>> {
        self.storages
            .get_mut(handle.component_type.index())
            .and_then(|storage| storage.as_any_mut().downcast_mut())
            .ok_or(EcsError::ComponentNotRegistered(type_name::<C>()))
    }

    /// Drops the entity's data from every store, returning how many held it.
    pub(crate) fn entity_destroyed(&mut self, entity: Entity) -> usize {
        self.storages
            .iter_mut()
            .map(|storage| storage.on_entity_destroyed(entity))
            .filter(|removed| *removed)
            .count()
    }

    pub(crate) fn len(&self) -> usize {
        self.storages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Health(#[allow(dead_code)] u32);
    struct Armor;

    #[test]
    fn test_indices_are_assigned_in_order() {
        let mut registry = ComponentRegistry::new(8);
        let health = registry.register::<Health>().unwrap();
        let armor = registry.register::<Armor>().unwrap();

        assert_eq!(health.component_type(), ComponentType::from_raw(0));
        assert_eq!(armor.component_type(), ComponentType::from_raw(1));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_double_registration() {
        let mut registry = ComponentRegistry::new(8);
        registry.register::<Health>().unwrap();

        assert!(matches!(
            registry.register::<Health>(),
            Err(EcsError::ComponentAlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_unregistered_lookup() {
        let registry = ComponentRegistry::new(8);
        assert!(matches!(
            registry.component_type::<Armor>(),
            Err(EcsError::ComponentNotRegistered(_))
        ));
    }
}
