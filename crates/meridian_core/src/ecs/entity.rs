//! # Entity Management
//!
//! Entities are lightweight handles: an index into the world's slots.
//! Freed indices go to the back of a FIFO queue, so a destroyed id is
//! reused as late as possible.

use super::signature::Signature;
use crate::error::{EcsError, EcsResult};
use std::collections::VecDeque;
use std::fmt;

/// Entity handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Entity(u32);

impl Entity {
    /// Creates an entity handle from its raw index.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw index.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the index as `usize` for slot addressing.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out entity ids and owns every entity's signature.
///
/// # Invariants
///
/// - `alive_count + free.len() == capacity`
/// - A free entity's signature is empty
pub struct EntityAllocator {
    /// Free ids, oldest at the front.
    free: VecDeque<Entity>,
    /// Signature per slot.
    signatures: Box<[Signature]>,
    /// Liveness per slot.
    alive: Box<[bool]>,
    /// Number of currently alive entities.
    alive_count: usize,
    /// Maximum capacity.
    capacity: usize,
}

impl EntityAllocator {
    /// Creates an allocator with every id in `[0, capacity)` free.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or exceeds `u32::MAX`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(
            u32::try_from(capacity).is_ok(),
            "Capacity cannot exceed u32::MAX"
        );

        #[allow(clippy::cast_possible_truncation)]
        let free = (0..capacity as u32).map(Entity).collect();

        Self {
            free,
            signatures: vec![Signature::EMPTY; capacity].into_boxed_slice(),
            alive: vec![false; capacity].into_boxed_slice(),
            alive_count: 0,
            capacity,
        }
    }

    /// Returns the maximum capacity.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of currently alive entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Takes the oldest free id.
    ///
    /// # Errors
    ///
    /// Returns `CapacityExhausted` when every id is alive.
    pub fn create(&mut self) -> EcsResult<Entity> {
        let entity = self.free.pop_front().ok_or(EcsError::CapacityExhausted {
            capacity: self.capacity,
        })?;

        self.alive[entity.index()] = true;
        self.alive_count += 1;
        Ok(entity)
    }

    /// Clears the entity's signature and queues its id for reuse.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is out of range or not alive.
    pub fn destroy(&mut self, entity: Entity) -> EcsResult<()> {
        let index = self.check_alive(entity)?;

        self.signatures[index] = Signature::EMPTY;
        self.alive[index] = false;
        self.alive_count -= 1;
        self.free.push_back(entity);
        Ok(())
    }

    /// Returns true if the entity is currently alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.alive.get(entity.index()).copied().unwrap_or(false)
    }

    /// Returns the entity's signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is out of range or not alive.
    #[inline]
    pub fn signature(&self, entity: Entity) -> EcsResult<Signature> {
        let index = self.check_alive(entity)?;
        Ok(self.signatures[index])
    }

    /// Replaces the entity's signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is out of range or not alive.
    #[inline]
    pub fn set_signature(&mut self, entity: Entity, signature: Signature) -> EcsResult<()> {
        let index = self.check_alive(entity)?;
        self.signatures[index] = signature;
        Ok(())
    }

    /// Iterates over alive entities with their signatures, in index order.
    pub fn iter_alive(&self) -> impl Iterator<Item = (Entity, Signature)> + '_ {
        self.alive
            .iter()
            .zip(self.signatures.iter())
            .enumerate()
            .filter(|(_, (alive, _))| **alive)
            .map(|(index, (_, signature))| {
                #[allow(clippy::cast_possible_truncation)]
                let entity = Entity(index as u32);
                (entity, *signature)
            })
    }

    /// Validates an entity and returns its slot index.
    pub(crate) fn check_alive(&self, entity: Entity) -> EcsResult<usize> {
        let index = entity.index();
        if index >= self.capacity {
            return Err(EcsError::EntityOutOfRange {
                entity,
                capacity: self.capacity,
            });
        }
        if !self.alive[index] {
            return Err(EcsError::EntityNotAlive(entity));
        }
        Ok(index)
    }
}
