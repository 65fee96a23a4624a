//! # Meridian Core
//!
//! Entity Component System with dense, pre-sized component storage and
//! signature-based system dispatch.
//!
//! ## Architecture Rules
//!
//! 1. **Entities are plain indices** - recycled through a FIFO free list
//! 2. **Data-oriented design** - each component type lives in one packed array
//! 3. **Systems are interest sets** - an entity belongs to a system exactly
//!    when its signature covers the system's required signature
//!
//! ## Example
//!
//! ```rust,ignore
//! use meridian_core::{Signature, World};
//!
//! let mut world = World::new(10_000);
//! let health = world.register_component::<Health>()?;
//!
//! let entity = world.create_entity()?;
//! world.add_component(entity, Health(100))?;
//! assert!(world.signature(entity)?.has(health.component_type()));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;

pub use config::WorldConfig;
pub use ecs::{
    AnyStorage, Component, ComponentHandle, ComponentStorage, ComponentType, Entity,
    EntityAllocator, Signature, System, SystemRegistry, World, MAX_COMPONENTS,
};
pub use error::{EcsError, EcsResult};

/// Default entity capacity of a world.
pub const DEFAULT_MAX_ENTITIES: usize = 10_000;
