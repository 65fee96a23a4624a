//! # ECS Errors
//!
//! Every contract violation of the ECS surfaces as a typed error instead of
//! an abort. `CapacityExhausted` is the only one callers are expected to
//! recover from at runtime.

use crate::ecs::Entity;
use thiserror::Error;

/// ECS errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Every entity slot is in use.
    #[error("Entity capacity exhausted: all {capacity} entities are alive")]
    CapacityExhausted {
        /// World capacity.
        capacity: usize,
    },

    /// Entity index is outside the world's range.
    #[error("Entity {entity} is out of range (capacity {capacity})")]
    EntityOutOfRange {
        /// Offending entity.
        entity: Entity,
        /// World capacity.
        capacity: usize,
    },

    /// Entity is not currently alive.
    #[error("Entity {0} is not alive")]
    EntityNotAlive(Entity),

    /// Component type registered twice.
    #[error("Component type already registered: {0}")]
    ComponentAlreadyRegistered(&'static str),

    /// Component type used before registration.
    #[error("Component type not registered: {0}")]
    ComponentNotRegistered(&'static str),

    /// The signature has no bit left for another component type.
    #[error("Too many component types: at most {max} can be registered")]
    TooManyComponentTypes {
        /// Compile-time maximum.
        max: usize,
    },

    /// Entity already has this component.
    #[error("Entity {entity} already has component {component}")]
    DuplicateComponent {
        /// Target entity.
        entity: Entity,
        /// Component type name.
        component: &'static str,
    },

    /// Entity does not have this component.
    #[error("Entity {entity} has no component {component}")]
    MissingComponent {
        /// Target entity.
        entity: Entity,
        /// Component type name.
        component: &'static str,
    },

    /// System type registered twice.
    #[error("System already registered: {0}")]
    SystemAlreadyRegistered(&'static str),

    /// System type used before registration.
    #[error("System not registered: {0}")]
    SystemNotRegistered(&'static str),
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;
