//! # ECS World
//!
//! The single entry point for entities, components and system membership.
//! Every operation that changes a signature notifies the system registry
//! in the same call, so matched sets never lag behind the stores.

use super::component::{Component, ComponentHandle, ComponentRegistry, ComponentType};
use super::entity::{Entity, EntityAllocator};
use super::signature::Signature;
use super::storage::ComponentStorage;
use super::system::{System, SystemRegistry};
use crate::config::WorldConfig;
use crate::error::EcsResult;
use std::collections::BTreeSet;

/// The ECS World - container for all game state.
///
/// # Capacity
///
/// The world has a fixed capacity set at creation. Every component store
/// is sized to it on registration.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new(10_000);
/// world.register_component::<Health>()?;
///
/// let entity = world.create_entity()?;
/// world.add_component(entity, Health(100))?;
/// ```
pub struct World {
    entities: EntityAllocator,
    components: ComponentRegistry,
    systems: SystemRegistry,
}

impl World {
    /// Creates a new world with the specified entity capacity.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of simultaneously alive entities
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or exceeds `u32::MAX`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entities: EntityAllocator::new(capacity),
            components: ComponentRegistry::new(capacity),
            systems: SystemRegistry::new(),
        }
    }

    /// Creates a world sized by configuration.
    ///
    /// # Panics
    ///
    /// Panics if `max_entities` is zero or exceeds `u32::MAX`.
    #[must_use]
    pub fn with_config(config: &WorldConfig) -> Self {
        Self::new(config.max_entities)
    }

    /// Returns the maximum capacity of this world.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.entities.capacity()
    }

    /// Returns the number of currently alive entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.entities.alive_count()
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity with an empty signature.
    ///
    /// # Errors
    ///
    /// Returns `CapacityExhausted` when every entity is alive.
    pub fn create_entity(&mut self) -> EcsResult<Entity> {
        self.entities.create()
    }

    /// Destroys an entity.
    ///
    /// Order: every component store drops the entity's data, then every
    /// system drops the entity, then its id goes back to the free pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is out of range or not alive.
    pub fn destroy_entity(&mut self, entity: Entity) -> EcsResult<()> {
        self.entities.check_alive(entity)?;

        self.components.entity_destroyed(entity);
        self.systems.on_entity_destroyed(entity);
        self.entities.destroy(entity)
    }

    /// Returns true if the entity is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Returns the entity's signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is out of range or not alive.
    pub fn signature(&self, entity: Entity) -> EcsResult<Signature> {
        self.entities.signature(entity)
    }

    /// Iterates over alive entities in index order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter_alive().map(|(entity, _)| entity)
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Registers a component type and creates its store.
    ///
    /// # Errors
    ///
    /// Returns `ComponentAlreadyRegistered` on a second registration, or
    /// `TooManyComponentTypes` once every signature bit is taken.
    pub fn register_component<C: Component>(&mut self) -> EcsResult<ComponentHandle<C>> {
        self.components.register::<C>()
    }

    /// Returns the dense index of a registered component type.
    ///
    /// # Errors
    ///
    /// Returns `ComponentNotRegistered` for an unknown type.
    pub fn component_type<C: Component>(&self) -> EcsResult<ComponentType> {
        self.components.component_type::<C>()
    }

    /// Returns the typed handle of a registered component type.
    ///
    /// # Errors
    ///
    /// Returns `ComponentNotRegistered` for an unknown type.
    pub fn component_handle<C: Component>(&self) -> EcsResult<ComponentHandle<C>> {
        self.components.handle::<C>()
    }

    /// Number of registered component types.
    #[must_use]
    pub fn component_type_count(&self) -> usize {
        self.components.len()
    }

    /// Attaches a component and updates system membership.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is dead, the type is unregistered, or
    /// the entity already has this component.
    pub fn add_component<C: Component>(&mut self, entity: Entity, component: C) -> EcsResult<()> {
        let handle = self.components.handle::<C>()?;
        self.add_component_with(handle, entity, component)
    }

    /// [`Self::add_component`] through a typed handle.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_component`].
    pub fn add_component_with<C: Component>(
        &mut self,
        handle: ComponentHandle<C>,
        entity: Entity,
        component: C,
    ) -> EcsResult<()> {
        let signature = self.entities.signature(entity)?;
        self.components.storage_mut(handle)?.insert(entity, component)?;

        let signature = signature.with(handle.component_type());
        self.entities.set_signature(entity, signature)?;
        self.systems.on_signature_changed(entity, signature);
        Ok(())
    }

    /// Detaches a component, returns it and updates system membership.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is dead, the type is unregistered, or
    /// the entity does not have this component.
    pub fn remove_component<C: Component>(&mut self, entity: Entity) -> EcsResult<C> {
        let handle = self.components.handle::<C>()?;
        let signature = self.entities.signature(entity)?;
        let removed = self.components.storage_mut(handle)?.remove(entity)?;

        let signature = signature.without(handle.component_type());
        self.entities.set_signature(entity, signature)?;
        self.systems.on_signature_changed(entity, signature);
        Ok(removed)
    }

    /// Overwrites the entity's component, attaching it if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is dead or the type is unregistered.
    pub fn set_component<C: Component>(&mut self, entity: Entity, component: C) -> EcsResult<()> {
        let handle = self.components.handle::<C>()?;
        self.entities.check_alive(entity)?;

        let storage = self.components.storage_mut(handle)?;
        if storage.has(entity) {
            *storage.get_mut(entity)? = component;
            return Ok(());
        }
        self.add_component_with(handle, entity, component)
    }

    /// Gets the entity's component.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is dead, the type is unregistered, or
    /// the entity does not have this component.
    pub fn get_component<C: Component>(&self, entity: Entity) -> EcsResult<&C> {
        self.entities.check_alive(entity)?;
        self.storage::<C>()?.get(entity)
    }

    /// Gets the entity's component mutably.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is dead, the type is unregistered, or
    /// the entity does not have this component.
    pub fn get_component_mut<C: Component>(&mut self, entity: Entity) -> EcsResult<&mut C> {
        self.entities.check_alive(entity)?;
        self.storage_mut::<C>()?.get_mut(entity)
    }

    /// Returns true if the entity is alive and has the component.
    /// Unregistered component types are never present.
    #[must_use]
    pub fn has_component<C: Component>(&self, entity: Entity) -> bool {
        self.is_alive(entity)
            && self
                .storage::<C>()
                .is_ok_and(|storage| storage.has(entity))
    }

    /// Returns the store of a component type.
    ///
    /// # Errors
    ///
    /// Returns `ComponentNotRegistered` for an unknown type.
    pub fn storage<C: Component>(&self) -> EcsResult<&ComponentStorage<C>> {
        let handle = self.components.handle::<C>()?;
        self.components.storage(handle)
    }

    /// Returns the store of a component type mutably.
    ///
    /// Components can be modified in place; adding or removing must go
    /// through the world so signatures stay in sync.
    ///
    /// # Errors
    ///
    /// Returns `ComponentNotRegistered` for an unknown type.
    pub fn storage_mut<C: Component>(&mut self) -> EcsResult<&mut ComponentStorage<C>> {
        let handle = self.components.handle::<C>()?;
        self.components.storage_mut(handle)
    }

    /// Returns a store through its typed handle.
    ///
    /// # Errors
    ///
    /// Returns `ComponentNotRegistered` if the handle belongs to another world.
    pub fn storage_of<C: Component>(
        &self,
        handle: ComponentHandle<C>,
    ) -> EcsResult<&ComponentStorage<C>> {
        self.components.storage(handle)
    }

    // =========================================================================
    // Systems
    // =========================================================================

    /// Registers a system type.
    ///
    /// # Errors
    ///
    /// Returns `SystemAlreadyRegistered` on a second registration.
    pub fn register_system<S: System>(&mut self) -> EcsResult<()> {
        self.systems.register::<S>()
    }

    /// Registers a system and stores it so [`Self::run_systems`] drives it.
    ///
    /// # Errors
    ///
    /// Returns `SystemAlreadyRegistered` on a second registration.
    pub fn add_system<S: System>(&mut self, system: S) -> EcsResult<()> {
        self.systems.register_instance(system)
    }

    /// The stored instance of a system added with [`Self::add_system`].
    ///
    /// `None` for systems registered by type only, and for a system asking
    /// for itself inside its own `update`.
    #[must_use]
    pub fn system<S: System>(&self) -> Option<&S> {
        self.systems.instance::<S>().ok().flatten()
    }

    /// The stored instance of a system, mutably.
    #[must_use]
    pub fn system_mut<S: System>(&mut self) -> Option<&mut S> {
        self.systems.instance_mut::<S>().ok().flatten()
    }

    /// Runs every stored system once, in registration order.
    ///
    /// Each system is taken out of the registry for the duration of its
    /// `update`, so it gets the whole world mutably.
    pub fn run_systems(&mut self, dt: f32) {
        for index in 0..self.systems.len() {
            if let Some(mut stored) = self.systems.take_instance(index) {
                stored.run(self, dt);
                self.systems.restore_instance(index, stored);
            }
        }
    }

    /// Sets a system's required signature and recomputes its matched set
    /// over every live entity.
    ///
    /// # Errors
    ///
    /// Returns `SystemNotRegistered` if the system was never registered.
    pub fn set_system_signature<S: System>(&mut self, signature: Signature) -> EcsResult<()> {
        self.systems.set_signature::<S>(signature)?;
        self.systems.refresh::<S>(self.entities.iter_alive())
    }

    /// Returns the entities a system currently matches.
    ///
    /// # Errors
    ///
    /// Returns `SystemNotRegistered` if the system was never registered.
    pub fn system_entities<S: System>(&self) -> EcsResult<&BTreeSet<Entity>> {
        self.systems.entities::<S>()
    }

    /// Returns an owned copy of a system's matched set.
    ///
    /// Iterate over this when the loop body adds or removes components or
    /// destroys entities; re-check [`Self::is_alive`] for entities touched
    /// earlier in the same loop.
    ///
    /// # Errors
    ///
    /// Returns `SystemNotRegistered` if the system was never registered.
    pub fn system_entities_snapshot<S: System>(&self) -> EcsResult<Vec<Entity>> {
        Ok(self.systems.entities::<S>()?.iter().copied().collect())
    }

    /// Returns the system registry.
    #[must_use]
    pub const fn systems(&self) -> &SystemRegistry {
        &self.systems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EcsError;

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    struct Position(f32, f32);

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    struct Velocity(f32, f32);

    #[derive(Debug, Default)]
    struct Movement;

    impl System for Movement {
        fn update(&mut self, world: &mut World, dt: f32) {
            for entity in world.system_entities_snapshot::<Self>().unwrap() {
                let velocity = *world.get_component::<Velocity>(entity).unwrap();
                let position = world.get_component_mut::<Position>(entity).unwrap();
                position.0 += velocity.0 * dt;
                position.1 += velocity.1 * dt;
            }
        }
    }

    /// Destroys every matched entity while iterating.
    struct Reaper;

    impl System for Reaper {
        fn update(&mut self, world: &mut World, _dt: f32) {
            for entity in world.system_entities_snapshot::<Self>().unwrap() {
                world.destroy_entity(entity).unwrap();
            }
        }
    }

    /// Counts matched entities seen per tick.
    #[derive(Default)]
    struct Census {
        seen: Vec<usize>,
    }

    impl System for Census {
        fn update(&mut self, world: &mut World, _dt: f32) {
            let matched = world.system_entities::<Self>().map_or(0, BTreeSet::len);
            self.seen.push(matched);
        }
    }

    fn world_with_movement() -> World {
        let mut world = World::new(16);
        let position = world.register_component::<Position>().unwrap();
        let velocity = world.register_component::<Velocity>().unwrap();
        world.register_system::<Movement>().unwrap();
        world
            .set_system_signature::<Movement>(
                Signature::EMPTY
                    .with(position.component_type())
                    .with(velocity.component_type()),
            )
            .unwrap();
        world
    }

    #[test]
    fn test_world_creation() {
        let world = World::with_config(&WorldConfig::default());
        assert_eq!(world.capacity(), 10_000);
        assert_eq!(world.alive_count(), 0);
    }

    #[test]
    fn test_signature_tracks_components() {
        let mut world = world_with_movement();
        let position = world.component_type::<Position>().unwrap();
        let entity = world.create_entity().unwrap();

        world.add_component(entity, Position(1.0, 2.0)).unwrap();
        assert!(world.has_component::<Position>(entity));
        assert!(world.signature(entity).unwrap().has(position));

        let removed = world.remove_component::<Position>(entity).unwrap();
        assert_eq!(removed, Position(1.0, 2.0));
        assert!(!world.has_component::<Position>(entity));
        assert!(!world.signature(entity).unwrap().has(position));
    }

    #[test]
    fn test_system_membership() {
        let mut world = world_with_movement();
        let moving = world.create_entity().unwrap();
        let still = world.create_entity().unwrap();

        world.add_component(moving, Position::default()).unwrap();
        world.add_component(still, Position::default()).unwrap();
        assert!(world.system_entities::<Movement>().unwrap().is_empty());

        world.add_component(moving, Velocity(1.0, 0.0)).unwrap();
        let members = world.system_entities::<Movement>().unwrap();
        assert_eq!(members.len(), 1);
        assert!(members.contains(&moving));

        world.remove_component::<Velocity>(moving).unwrap();
        assert!(world.system_entities::<Movement>().unwrap().is_empty());
    }

    #[test]
    fn test_late_signature_picks_up_existing_entities() {
        let mut world = World::new(8);
        let position = world.register_component::<Position>().unwrap();
        let entity = world.create_entity().unwrap();
        world.add_component(entity, Position::default()).unwrap();

        world.register_system::<Movement>().unwrap();
        world
            .set_system_signature::<Movement>(Signature::EMPTY.with(position.component_type()))
            .unwrap();
        assert!(world.system_entities::<Movement>().unwrap().contains(&entity));
    }

    #[test]
    fn test_system_update() {
        let mut world = world_with_movement();
        let entity = world.create_entity().unwrap();
        world.add_component(entity, Position(0.0, 0.0)).unwrap();
        world.add_component(entity, Velocity(2.0, -1.0)).unwrap();

        let mut movement = Movement;
        movement.update(&mut world, 0.5);
        assert_eq!(
            *world.get_component::<Position>(entity).unwrap(),
            Position(1.0, -0.5)
        );
    }

    #[test]
    fn test_destroy_removes_everywhere() {
        let mut world = world_with_movement();
        let entity = world.create_entity().unwrap();
        world.add_component(entity, Position::default()).unwrap();
        world.add_component(entity, Velocity::default()).unwrap();

        world.destroy_entity(entity).unwrap();
        assert!(!world.is_alive(entity));
        assert!(!world.has_component::<Position>(entity));
        assert!(world.storage::<Velocity>().unwrap().is_empty());
        assert!(world.system_entities::<Movement>().unwrap().is_empty());
        assert_eq!(
            world.destroy_entity(entity),
            Err(EcsError::EntityNotAlive(entity))
        );
    }

    #[test]
    fn test_destroy_during_iteration() {
        let mut world = World::new(8);
        let position = world.register_component::<Position>().unwrap();
        world.register_system::<Reaper>().unwrap();
        world
            .set_system_signature::<Reaper>(Signature::EMPTY.with(position.component_type()))
            .unwrap();

        for _ in 0..5 {
            let entity = world.create_entity().unwrap();
            world.add_component(entity, Position::default()).unwrap();
        }

        Reaper.update(&mut world, 0.0);
        assert_eq!(world.alive_count(), 0);
        assert!(world.system_entities::<Reaper>().unwrap().is_empty());
    }

    #[test]
    fn test_run_systems_drives_stored_instances() {
        let mut world = World::new(8);
        let position = world.register_component::<Position>().unwrap();
        let velocity = world.register_component::<Velocity>().unwrap();
        world.add_system(Movement).unwrap();
        world
            .set_system_signature::<Movement>(
                Signature::EMPTY
                    .with(position.component_type())
                    .with(velocity.component_type()),
            )
            .unwrap();
        world.add_system(Census::default()).unwrap();
        world
            .set_system_signature::<Census>(Signature::EMPTY.with(position.component_type()))
            .unwrap();

        let entity = world.create_entity().unwrap();
        world.add_component(entity, Position(0.0, 0.0)).unwrap();
        world.add_component(entity, Velocity(2.0, 1.0)).unwrap();

        world.run_systems(0.5);
        world.run_systems(0.5);

        assert_eq!(*world.get_component::<Position>(entity).unwrap(), Position(2.0, 1.0));
        assert_eq!(world.system::<Census>().unwrap().seen, vec![1, 1]);
        assert!(matches!(
            world.add_system(Movement),
            Err(EcsError::SystemAlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_caller_owned_system_is_not_run() {
        let mut world = World::new(4);
        world.register_system::<Census>().unwrap();
        world.run_systems(1.0);

        assert!(world.system::<Census>().is_none());
        assert_eq!(world.systems().len(), 1);
    }

    #[test]
    fn test_set_component_overwrites_or_adds() {
        let mut world = world_with_movement();
        let entity = world.create_entity().unwrap();

        world.set_component(entity, Velocity(1.0, 1.0)).unwrap();
        world.set_component(entity, Velocity(3.0, 3.0)).unwrap();
        assert_eq!(
            *world.get_component::<Velocity>(entity).unwrap(),
            Velocity(3.0, 3.0)
        );
        assert_eq!(world.storage::<Velocity>().unwrap().len(), 1);
    }

    #[test]
    fn test_dead_entity_access() {
        let mut world = world_with_movement();
        let entity = world.create_entity().unwrap();
        world.destroy_entity(entity).unwrap();

        assert_eq!(
            world.add_component(entity, Position::default()),
            Err(EcsError::EntityNotAlive(entity))
        );
        assert!(world.get_component::<Position>(entity).is_err());
    }

    #[test]
    fn test_unregistered_component() {
        let mut world = World::new(4);
        let entity = world.create_entity().unwrap();

        assert!(!world.has_component::<Position>(entity));
        assert!(matches!(
            world.add_component(entity, Position::default()),
            Err(EcsError::ComponentNotRegistered(_))
        ));
    }

    #[test]
    fn test_too_many_component_types() {
        struct Tag<const N: usize>;

        let mut world = World::new(4);
        macro_rules! register {
            ($($n:literal)*) => { $( world.register_component::<Tag<$n>>().unwrap(); )* };
        }
        register!(0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31);

        assert_eq!(world.component_type_count(), 32);
        assert_eq!(
            world.register_component::<Tag<32>>().map(|_| ()),
            Err(EcsError::TooManyComponentTypes { max: 32 })
        );
    }
}
