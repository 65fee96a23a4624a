//! # Entity Component System
//!
//! ## Design Philosophy
//!
//! - Entity slots and component arrays are sized once, at world creation
//! - Components are stored in dense arrays for cache efficiency
//! - Entity IDs are simple indices, recycled oldest-first
//! - Stores are type-erased only where the world must sweep all of them

mod component;
mod entity;
mod signature;
mod storage;
mod system;
mod world;

pub use component::{Component, ComponentHandle, ComponentType};
pub use entity::{Entity, EntityAllocator};
pub use signature::{Signature, MAX_COMPONENTS};
pub use storage::{AnyStorage, ComponentStorage};
pub use system::{System, SystemRegistry};
pub use world::World;
