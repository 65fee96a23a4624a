//! # Systems
//!
//! A system declares the component signature it is interested in. The
//! registry keeps, per system, the exact set of live entities whose
//! signature covers it, updated incrementally on every signature change.
//!
//! Systems added with an instance are stored here and run in registration
//! order by [`World::run_systems`]. Systems registered by type only are
//! owned and driven by the caller.

use super::entity::Entity;
use super::signature::Signature;
use super::world::World;
use crate::error::{EcsError, EcsResult};
use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeSet, HashMap};

/// Logic that runs over a world once per tick.
///
/// Inside `update`, iterate over
/// [`World::system_entities_snapshot`] when the loop mutates the world.
pub trait System: 'static {
    /// Runs one tick.
    fn update(&mut self, world: &mut World, dt: f32);
}

type RunFn = fn(&mut dyn Any, &mut World, f32);

/// A stored system with its type-erased update.
pub(crate) struct StoredSystem {
    system: Box<dyn Any>,
    run: RunFn,
}

impl StoredSystem {
    fn new<S: System>(system: S) -> Self {
        Self {
            system: Box::new(system),
            run: run_stored::<S>,
        }
    }

    pub(crate) fn run(&mut self, world: &mut World, dt: f32) {
        (self.run)(self.system.as_mut(), world, dt);
    }
}

fn run_stored<S: System>(system: &mut dyn Any, world: &mut World, dt: f32) {
    if let Some(system) = system.downcast_mut::<S>() {
        system.update(world, dt);
    }
}

struct SystemEntry {
    name: &'static str,
    /// `None` until a signature is set; such a system matches nothing.
    required: Option<Signature>,
    entities: BTreeSet<Entity>,
    /// `None` for caller-owned systems, and while the system is running.
    instance: Option<StoredSystem>,
}

impl SystemEntry {
    fn matches(&self, signature: Signature) -> bool {
        self.required
            .is_some_and(|required| signature.contains(required))
    }

    fn update_membership(&mut self, entity: Entity, signature: Signature) {
        if self.matches(signature) {
            self.entities.insert(entity);
        } else {
            self.entities.remove(&entity);
        }
    }
}

/// Required signature and matched entity set per system type.
#[derive(Default)]
pub struct SystemRegistry {
    entries: Vec<SystemEntry>,
    index: HashMap<TypeId, usize>,
}

impl SystemRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a system type.
    ///
    /// # Errors
    ///
    /// Returns `SystemAlreadyRegistered` if the type is already known.
    pub fn register<S: System>(&mut self) -> EcsResult<()> {
        let type_id = TypeId::of::<S>();
        if self.index.contains_key(&type_id) {
            return Err(EcsError::SystemAlreadyRegistered(type_name::<S>()));
        }

        self.index.insert(type_id, self.entries.len());
        self.entries.push(SystemEntry {
            name: type_name::<S>(),
            required: None,
            entities: BTreeSet::new(),
            instance: None,
        });
        Ok(())
    }

    /// Registers a system type and stores its instance.
    ///
    /// # Errors
    ///
    /// Returns `SystemAlreadyRegistered` if the type is already known.
    pub fn register_instance<S: System>(&mut self, system: S) -> EcsResult<()> {
        self.register::<S>()?;
        self.entry_mut::<S>()?.instance = Some(StoredSystem::new(system));
        Ok(())
    }

    /// The stored instance of a system, if it has one.
    ///
    /// # Errors
    ///
    /// Returns `SystemNotRegistered` if the system was never registered.
    pub fn instance<S: System>(&self) -> EcsResult<Option<&S>> {
        Ok(self
            .entry::<S>()?
            .instance
            .as_ref()
            .and_then(|stored| stored.system.downcast_ref::<S>()))
    }

    /// The stored instance of a system, mutably.
    ///
    /// # Errors
    ///
    /// Returns `SystemNotRegistered` if the system was never registered.
    pub fn instance_mut<S: System>(&mut self) -> EcsResult<Option<&mut S>> {
        Ok(self
            .entry_mut::<S>()?
            .instance
            .as_mut()
            .and_then(|stored| stored.system.downcast_mut::<S>()))
    }

    pub(crate) fn take_instance(&mut self, index: usize) -> Option<StoredSystem> {
        self.entries.get_mut(index)?.instance.take()
    }

    pub(crate) fn restore_instance(&mut self, index: usize, stored: StoredSystem) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.instance = Some(stored);
        }
    }

    /// Sets the signature a system requires.
    ///
    /// The matched set is emptied; callers that know every live entity
    /// follow with [`Self::refresh`]. [`World::set_system_signature`] does both.
    ///
    /// # Errors
    ///
    /// Returns `SystemNotRegistered` if the system was never registered.
    pub fn set_signature<S: System>(&mut self, signature: Signature) -> EcsResult<()> {
        let entry = self.entry_mut::<S>()?;
        entry.required = Some(signature);
        entry.entities.clear();
        Ok(())
    }

    /// Returns the signature a system requires, if one was set.
    ///
    /// # Errors
    ///
    /// Returns `SystemNotRegistered` if the system was never registered.
    pub fn signature<S: System>(&self) -> EcsResult<Option<Signature>> {
        Ok(self.entry::<S>()?.required)
    }

    /// Returns the entities a system currently matches.
    ///
    /// # Errors
    ///
    /// Returns `SystemNotRegistered` if the system was never registered.
    pub fn entities<S: System>(&self) -> EcsResult<&BTreeSet<Entity>> {
        Ok(&self.entry::<S>()?.entities)
    }

    /// Recomputes one system's matched set from scratch.
    ///
    /// # Errors
    ///
    /// Returns `SystemNotRegistered` if the system was never registered.
    pub fn refresh<S: System>(
        &mut self,
        alive: impl IntoIterator<Item = (Entity, Signature)>,
    ) -> EcsResult<()> {
        let entry = self.entry_mut::<S>()?;
        entry.entities.clear();
        for (entity, signature) in alive {
            entry.update_membership(entity, signature);
        }
        Ok(())
    }

    /// Re-evaluates the entity against every system. Idempotent.
    pub fn on_signature_changed(&mut self, entity: Entity, signature: Signature) {
        for entry in &mut self.entries {
            entry.update_membership(entity, signature);
        }
    }

    /// Removes the entity from every system.
    pub fn on_entity_destroyed(&mut self, entity: Entity) {
        for entry in &mut self.entries {
            entry.entities.remove(&entity);
        }
    }

    /// Number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no system is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of the registered systems, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|entry| entry.name)
    }

    fn entry<S: System>(&self) -> EcsResult<&SystemEntry> {
        self.index
            .get(&TypeId::of::<S>())
            .map(|&index| &self.entries[index])
            .ok_or(EcsError::SystemNotRegistered(type_name::<S>()))
    }

    fn entry_mut<S: System>(&mut self) -> EcsResult<&mut SystemEntry> {
        match self.index.get(&TypeId::of::<S>()) {
            Some(&index) => Ok(&mut self.entries[index]),
            None => Err(EcsError::SystemNotRegistered(type_name::<S>())),
        }
    }
}
