//! Network id bookkeeping.
//!
//! Maps network ids to local entities and back. The host also records
//! which connection owns each client-spawned entity; host-owned entities
//! have no owner row.

use crate::protocol::NetworkId;
use crate::transport::ConnectionId;
use meridian_core::Entity;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Local view of the session's network ids.
#[derive(Debug, Default)]
pub struct NetworkRegistry {
    by_id: BTreeMap<NetworkId, Entity>,
    by_entity: HashMap<Entity, NetworkId>,
    owners: HashMap<NetworkId, ConnectionId>,
    reserved: BTreeSet<NetworkId>,
}

impl NetworkRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds an id to an entity. Returns false if either side is taken.
    pub fn bind(&mut self, id: NetworkId, entity: Entity) -> bool {
        if self.by_id.contains_key(&id) || self.by_entity.contains_key(&entity) {
            return false;
        }
        self.by_id.insert(id, entity);
        self.by_entity.insert(entity, id);
        self.reserved.remove(&id);
        true
    }

    /// Removes an id and its owner row. Returns the entity it was bound to.
    pub fn unbind(&mut self, id: NetworkId) -> Option<Entity> {
        let entity = self.by_id.remove(&id)?;
        self.by_entity.remove(&entity);
        self.owners.remove(&id);
        Some(entity)
    }

    /// Entity bound to an id.
    #[must_use]
    pub fn entity(&self, id: NetworkId) -> Option<Entity> {
        self.by_id.get(&id).copied()
    }

    /// Id bound to an entity.
    #[must_use]
    pub fn network_id(&self, entity: Entity) -> Option<NetworkId> {
        self.by_entity.get(&entity).copied()
    }

    /// Returns true if the id is bound.
    #[must_use]
    pub fn contains(&self, id: NetworkId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Records the connection that owns an id (host only).
    pub fn set_owner(&mut self, id: NetworkId, connection: ConnectionId) {
        self.owners.insert(id, connection);
    }

    /// Clears an owner row, making the host the owner.
    pub fn clear_owner(&mut self, id: NetworkId) {
        self.owners.remove(&id);
    }

    /// Connection that owns an id, `None` for host-owned or unknown ids.
    #[must_use]
    pub fn owner(&self, id: NetworkId) -> Option<ConnectionId> {
        self.owners.get(&id).copied()
    }

    /// Drops every owner row pointing at a connection. Returns how many.
    pub fn forget_connection(&mut self, connection: ConnectionId) -> usize {
        let before = self.owners.len();
        self.owners.retain(|_, owner| *owner != connection);
        before - self.owners.len()
    }

    /// Notes an id announced as reserved but not yet bound here.
    pub fn note_reserved(&mut self, id: NetworkId) {
        if !self.by_id.contains_key(&id) {
            self.reserved.insert(id);
        }
    }

    /// Returns true if the id was announced but no entity uses it yet.
    #[must_use]
    pub fn is_reserved(&self, id: NetworkId) -> bool {
        self.reserved.contains(&id)
    }

    /// Bound ids and their entities, in ascending id order.
    pub fn bindings(&self) -> impl Iterator<Item = (NetworkId, Entity)> + '_ {
        self.by_id.iter().map(|(&id, &entity)| (id, entity))
    }

    /// Bound ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = NetworkId> + '_ {
        self.by_id.keys().copied()
    }

    /// Number of bound ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_both_directions() {
        let mut registry = NetworkRegistry::new();
        let entity = Entity::from_raw(3);

        assert!(registry.bind(NetworkId(10), entity));
        assert_eq!(registry.entity(NetworkId(10)), Some(entity));
        assert_eq!(registry.network_id(entity), Some(NetworkId(10)));

        // Neither side may be rebound
        assert!(!registry.bind(NetworkId(10), Entity::from_raw(4)));
        assert!(!registry.bind(NetworkId(11), entity));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unbind_clears_owner() {
        let mut registry = NetworkRegistry::new();
        registry.bind(NetworkId(1), Entity::from_raw(0));
        registry.set_owner(NetworkId(1), ConnectionId(2));

        assert_eq!(registry.unbind(NetworkId(1)), Some(Entity::from_raw(0)));
        assert_eq!(registry.owner(NetworkId(1)), None);
        assert_eq!(registry.network_id(Entity::from_raw(0)), None);
        assert_eq!(registry.unbind(NetworkId(1)), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_forget_connection() {
        let mut registry = NetworkRegistry::new();
        registry.set_owner(NetworkId(1), ConnectionId(1));
        registry.set_owner(NetworkId(2), ConnectionId(2));
        registry.set_owner(NetworkId(3), ConnectionId(1));

        assert_eq!(registry.forget_connection(ConnectionId(1)), 2);
        assert_eq!(registry.owner(NetworkId(2)), Some(ConnectionId(2)));
        assert_eq!(registry.owner(NetworkId(3)), None);
    }

    #[test]
    fn test_reserved_until_bound() {
        let mut registry = NetworkRegistry::new();
        registry.note_reserved(NetworkId(5));
        assert!(registry.is_reserved(NetworkId(5)));

        registry.bind(NetworkId(5), Entity::from_raw(1));
        assert!(!registry.is_reserved(NetworkId(5)));

        registry.note_reserved(NetworkId(5));
        assert!(!registry.is_reserved(NetworkId(5)));
    }
}
