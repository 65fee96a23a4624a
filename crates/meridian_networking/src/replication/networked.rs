//! The replication marker component.

use crate::protocol::{NetworkId, WireId};

/// Marks an entity as replicated.
///
/// Attached last, after every other component of the entity, so anything
/// matching on `Networked` sees a fully built entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Networked {
    /// Session-wide identity.
    pub id: NetworkId,
    /// True on the one peer that is authoritative for the entity.
    pub is_local: bool,
    /// Components sent in delta updates, in send order.
    pub synced: Vec<WireId>,
}

impl Networked {
    /// Marker for an entity this peer owns.
    #[must_use]
    pub fn owned(id: NetworkId, synced: Vec<WireId>) -> Self {
        Self {
            id,
            is_local: true,
            synced,
        }
    }

    /// Marker for a shadow of a remote peer's entity.
    #[must_use]
    pub fn shadow(id: NetworkId, synced: Vec<WireId>) -> Self {
        Self {
            id,
            is_local: false,
            synced,
        }
    }
}
