//! Inbound message handling.
//!
//! Ordering anomalies (a second init for a known id, an update or transfer
//! for an id this peer never saw) are ignored. Malformed or unauthorized
//! messages are dropped and counted.

use super::{Networked, ReplicationError, ReplicationResult, ReplicationSystem};
use crate::protocol::{ComponentFrame, Message, NetworkId, PeerId, WireId};
use crate::transport::{ConnectionId, Delivery, SendTarget, Transport, TransportEvent};
use meridian_core::{Entity, World};

impl<T: Transport + 'static> ReplicationSystem<T> {
    /// Handles one transport event.
    pub fn handle_event(&mut self, world: &mut World, event: TransportEvent) {
        match event {
            TransportEvent::Connected(connection) => self.on_connected(connection),
            TransportEvent::Disconnected(connection) => self.on_disconnected(connection),
            TransportEvent::Message { connection, bytes } => {
                self.stats.messages_received += 1;
                if let Err(error) = self.handle_message(world, connection, &bytes) {
                    self.stats.messages_dropped += 1;
                    tracing::debug!("Dropped message from {}: {}", connection, error);
                }
            }
        }
    }

    /// Decodes and applies one message received on `connection`.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is malformed or the sender is not
    /// allowed to send it. Nothing has been applied in that case, except
    /// when the world itself rejects a decoded component.
    pub fn handle_message(
        &mut self,
        world: &mut World,
        connection: ConnectionId,
        bytes: &[u8],
    ) -> ReplicationResult<()> {
        let (header, message) = Message::decode(bytes)?;
        tracing::trace!(
            "Received {:?} #{} from {}",
            header.message_type,
            header.sequence,
            connection
        );

        match message {
            Message::JoinRequest => self.on_join_request(connection),
            Message::JoinAccept { peer_id } => {
                self.on_join_accept(peer_id);
                Ok(())
            }
            Message::ReserveIdRequest => self.on_reserve_request(world, connection),
            Message::IdReserved { network_id } => {
                self.on_id_reserved(network_id);
                Ok(())
            }
            Message::IdGranted { network_id } => {
                self.on_id_granted(network_id);
                Ok(())
            }
            Message::EntityInit { network_id, frames } => {
                self.on_entity_init(world, connection, network_id, &frames, bytes)
            }
            Message::ComponentBatchUpdate { network_id, frames } => {
                self.on_batch_update(world, connection, network_id, &frames, bytes)
            }
            Message::OwnershipTransfer {
                network_id,
                new_owner,
            } => self.on_ownership_transfer(world, connection, network_id, new_owner, bytes),
        }
    }

    // =========================================================================
    // Connections
    // =========================================================================

    fn on_connected(&mut self, connection: ConnectionId) {
        if self.is_host() {
            tracing::debug!("Connection {} opened, waiting for join", connection);
            return;
        }
        tracing::info!("Connected to host, joining");
        if let Err(error) = self.send(SendTarget::Broadcast, &Message::JoinRequest) {
            tracing::warn!("Failed to send join request: {}", error);
        }
    }

    fn on_disconnected(&mut self, connection: ConnectionId) {
        if !self.is_host() {
            tracing::info!("Disconnected from host");
            self.local_peer = None;
            self.handshake = super::HandshakeState::Idle;
            return;
        }

        let peer = self.peers.remove(&connection);
        let released = self.registry.forget_connection(connection);
        self.seeded.remove(&connection);
        tracing::info!(
            "Client disconnected: {} ({:?}), {} entities left without owner",
            connection,
            peer,
            released
        );
    }

    fn on_join_request(&mut self, connection: ConnectionId) -> ReplicationResult<()> {
        if !self.is_host() {
            tracing::debug!("Ignoring join request on a client");
            return Ok(());
        }

        let peer_id = if let Some(&peer_id) = self.peers.get(&connection) {
            peer_id
        } else {
            let peer_id = PeerId(self.next_peer);
            self.next_peer += 1;
            self.peers.insert(connection, peer_id);
            tracing::info!("Client joined: {} as {}", connection, peer_id);
            peer_id
        };
        self.send(SendTarget::Connection(connection), &Message::JoinAccept { peer_id })
    }

    fn on_join_accept(&mut self, peer_id: PeerId) {
        if self.is_host() {
            tracing::debug!("Ignoring join accept on the host");
            return;
        }
        tracing::info!("Joined session as {}", peer_id);
        self.local_peer = Some(peer_id);
    }

    // =========================================================================
    // Handshake
    // =========================================================================

    fn on_reserve_request(
        &mut self,
        world: &World,
        connection: ConnectionId,
    ) -> ReplicationResult<()> {
        if !self.is_host() {
            tracing::debug!("Ignoring reserve request on a client");
            return Ok(());
        }

        let network_id = self.allocator.allocate();
        self.registry.note_reserved(network_id);
        self.registry.set_owner(network_id, connection);

        self.send(SendTarget::Broadcast, &Message::IdReserved { network_id })?;
        self.send(
            SendTarget::Connection(connection),
            &Message::IdGranted { network_id },
        )?;
        tracing::info!("Granted {} to {}", network_id, connection);

        if self.config.seed_new_peers && self.seeded.insert(connection) {
            self.seed_connection(world, connection)?;
        }
        Ok(())
    }

    /// Sends a new connection an init for every entity the host owns.
    fn seed_connection(&mut self, world: &World, connection: ConnectionId) -> ReplicationResult<()> {
        let mut seeded = 0;
        for &entity in world.system_entities::<Self>()? {
            let networked = world.get_component::<Networked>(entity)?;
            if !networked.is_local {
                continue;
            }
            let frames = self.codec.encode_attached(world, entity)?;
            self.send(
                SendTarget::Connection(connection),
                &Message::EntityInit {
                    network_id: networked.id,
                    frames,
                },
            )?;
            seeded += 1;
        }
        tracing::debug!("Seeded {} with {} host entities", connection, seeded);
        Ok(())
    }

    fn on_id_reserved(&mut self, network_id: NetworkId) {
        if self.is_host() {
            return;
        }
        tracing::trace!("{} reserved", network_id);
        self.registry.note_reserved(network_id);
    }

    fn on_id_granted(&mut self, network_id: NetworkId) {
        if self.is_host() {
            tracing::debug!("Ignoring id grant on the host");
            return;
        }
        if self.handshake.grant(network_id) {
            tracing::info!("Received network id {}", network_id);
        } else {
            tracing::debug!("Ignoring unrequested grant of {}", network_id);
        }
    }

    // =========================================================================
    // Entity state
    // =========================================================================

    fn on_entity_init(
        &mut self,
        world: &mut World,
        connection: ConnectionId,
        network_id: NetworkId,
        frames: &[ComponentFrame],
        bytes: &[u8],
    ) -> ReplicationResult<()> {
        if !network_id.is_valid() {
            return Err(ReplicationError::InvalidNetworkId);
        }
        if self.live_entity(world, network_id).is_some() {
            tracing::trace!("Ignoring duplicate init for {}", network_id);
            return Ok(());
        }
        if self.is_host() && self.registry.owner(network_id) != Some(connection) {
            return Err(ReplicationError::NotOwner {
                network_id,
                peer: self.peer_of(connection),
            });
        }

        let entity = world.create_entity()?;
        let built = self.apply_frames(world, entity, frames).and_then(|synced| {
            world.add_component(entity, Networked::shadow(network_id, synced))?;
            Ok(())
        });
        if let Err(error) = built.and_then(|()| self.bind(world, network_id, entity)) {
            world.destroy_entity(entity)?;
            return Err(error);
        }

        self.stats.shadows_created += 1;
        tracing::info!("Created shadow {} for {}", entity, network_id);

        if self.is_host() && self.config.relay {
            self.relay(SendTarget::BroadcastExcept(connection), bytes, Delivery::Reliable);
        }
        Ok(())
    }

    fn on_batch_update(
        &mut self,
        world: &mut World,
        connection: ConnectionId,
        network_id: NetworkId,
        frames: &[ComponentFrame],
        bytes: &[u8],
    ) -> ReplicationResult<()> {
        let Some(entity) = self.live_entity(world, network_id) else {
            tracing::trace!("Ignoring update for unknown {}", network_id);
            return Ok(());
        };
        if world.get_component::<Networked>(entity)?.is_local {
            tracing::debug!("Ignoring update for owned {}", network_id);
            return Ok(());
        }
        if self.is_host() && self.registry.owner(network_id) != Some(connection) {
            return Err(ReplicationError::NotOwner {
                network_id,
                peer: self.peer_of(connection),
            });
        }

        self.apply_frames(world, entity, frames)?;
        self.stats.updates_applied += 1;

        if self.is_host() && self.config.relay {
            self.relay(SendTarget::BroadcastExcept(connection), bytes, Delivery::Unreliable);
        }
        Ok(())
    }

    fn on_ownership_transfer(
        &mut self,
        world: &mut World,
        connection: ConnectionId,
        network_id: NetworkId,
        new_owner: PeerId,
        bytes: &[u8],
    ) -> ReplicationResult<()> {
        let Some(entity) = self.live_entity(world, network_id) else {
            tracing::trace!("Ignoring transfer of unknown {}", network_id);
            return Ok(());
        };

        if self.is_host() {
            if self.registry.owner(network_id) != Some(connection) {
                return Err(ReplicationError::NotOwner {
                    network_id,
                    peer: self.peer_of(connection),
                });
            }
            let owner_connection = self.connection_of(new_owner)?;
            self.apply_transfer(world, entity, network_id, new_owner)?;
            self.set_owner_row(network_id, owner_connection);
            self.relay(SendTarget::Broadcast, bytes, Delivery::Reliable);
        } else {
            self.apply_transfer(world, entity, network_id, new_owner)?;
        }

        tracing::info!("{} now owned by {}", network_id, new_owner);
        Ok(())
    }

    /// Applies every frame with a known wire id. Returns the applied ids.
    fn apply_frames(
        &self,
        world: &mut World,
        entity: Entity,
        frames: &[ComponentFrame],
    ) -> ReplicationResult<Vec<WireId>> {
        let mut applied = Vec::with_capacity(frames.len());
        for frame in frames {
            if !self.codec.knows(frame.wire_id) {
                tracing::trace!("Skipping unknown {} on {}", frame.wire_id, entity);
                continue;
            }
            self.codec.apply_frame(world, entity, frame)?;
            applied.push(frame.wire_id);
        }
        Ok(applied)
    }
}
