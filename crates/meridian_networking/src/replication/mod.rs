//! # Replication
//!
//! Keeps entities in sync between a host and its clients.
//!
//! ## Session Flow
//!
//! ```text
//! Client                         Host                        Other clients
//!   │── JoinRequest ───────────────▶│
//!   │◀────────────── JoinAccept ────│
//!   │── ReserveIdRequest ──────────▶│
//!   │◀─────────────── IdReserved ───│── IdReserved ─────────────────▶│
//!   │◀──────────────── IdGranted ───│
//!   │── EntityInit ────────────────▶│── EntityInit (relay) ─────────▶│
//!   │── ComponentBatchUpdate ──────▶│── ComponentBatchUpdate ───────▶│
//! ```
//!
//! ## Authority
//!
//! Exactly one peer owns each networked entity and is the only one that
//! sends its state. Everyone else holds a shadow (`is_local == false`) and
//! applies what arrives. Ownership moves only through `OwnershipTransfer`,
//! which the host fans out to every client.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut replication = ReplicationSystem::new(&mut world, transport, codec, config)?;
//!
//! loop {
//!     replication.poll(&mut world);
//!     // ... game systems ...
//!     replication.update(&mut world, dt);
//! }
//! ```

mod cache;
mod error;
mod handlers;
mod handshake;
mod networked;
mod registry;

pub use cache::ChangeCache;
pub use error::{ReplicationError, ReplicationResult};
pub use handshake::{HandshakeState, IdAllocator};
pub use networked::Networked;
pub use registry::NetworkRegistry;

use crate::codec::{CodecError, ComponentCodec};
use crate::config::ReplicationConfig;
use crate::protocol::{Message, NetworkId, PeerId, WireId};
use crate::transport::{ConnectionId, Delivery, SendTarget, Transport};
use meridian_core::{EcsError, EcsResult, Entity, Signature, System, World};
use std::collections::{HashMap, HashSet};

/// Replication counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplicationStats {
    /// Messages this peer originated.
    pub messages_sent: u64,
    /// Messages received.
    pub messages_received: u64,
    /// Received messages forwarded to other connections.
    pub messages_relayed: u64,
    /// Received messages rejected as malformed or unauthorized.
    pub messages_dropped: u64,
    /// Shadow entities created from inits.
    pub shadows_created: u64,
    /// Batch updates applied to shadows.
    pub updates_applied: u64,
}

/// Host or client side of a replicated session.
///
/// Owns its transport and codec. Registered as a system on the world it
/// was created with; its matched set is every entity carrying
/// [`Networked`].
pub struct ReplicationSystem<T> {
    transport: T,
    codec: ComponentCodec,
    config: ReplicationConfig,
    /// Host is always `PeerId::HOST`; a client has `None` until joined.
    local_peer: Option<PeerId>,
    handshake: HandshakeState,
    allocator: IdAllocator,
    registry: NetworkRegistry,
    peers: HashMap<ConnectionId, PeerId>,
    next_peer: u32,
    /// Connections already sent the host's entities.
    seeded: HashSet<ConnectionId>,
    cache: ChangeCache,
    sequence: u32,
    stats: ReplicationStats,
}

impl<T: Transport + 'static> ReplicationSystem<T> {
    /// Creates the replication side of a peer and installs it into `world`.
    ///
    /// Registers every codec component and [`Networked`] with the world,
    /// then registers this system with a `{Networked}` signature.
    ///
    /// # Errors
    ///
    /// Returns an ECS error if the world runs out of component types or a
    /// replication system of the same transport type is already registered.
    pub fn new(
        world: &mut World,
        transport: T,
        codec: ComponentCodec,
        config: ReplicationConfig,
    ) -> ReplicationResult<Self> {
        codec.register_components(world)?;
        if world.component_type::<Networked>().is_err() {
            world.register_component::<Networked>()?;
        }
        world.register_system::<Self>()?;
        let networked = world.component_type::<Networked>()?;
        world.set_system_signature::<Self>(Signature::EMPTY.with(networked))?;

        let is_host = transport.is_host();
        tracing::info!(
            "Replication started as {} with {} component codecs",
            if is_host { "host" } else { "client" },
            codec.len()
        );

        Ok(Self {
            transport,
            codec,
            config,
            local_peer: is_host.then_some(PeerId::HOST),
            handshake: HandshakeState::Idle,
            allocator: IdAllocator::new(),
            registry: NetworkRegistry::new(),
            peers: HashMap::new(),
            next_peer: PeerId::HOST.0 + 1,
            seeded: HashSet::new(),
            cache: ChangeCache::new(),
            sequence: 0,
            stats: ReplicationStats::default(),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns true on the session host.
    #[must_use]
    pub fn is_host(&self) -> bool {
        self.transport.is_host()
    }

    /// This peer's session identity.
    #[must_use]
    pub const fn local_peer(&self) -> Option<PeerId> {
        self.local_peer
    }

    /// Entity bound to a network id.
    ///
    /// Rows for entities destroyed directly through the world linger until
    /// the next [`Self::poll`] or [`Self::broadcast_changes`]; use
    /// [`Self::resolve`] when that matters.
    #[must_use]
    pub fn entity(&self, id: NetworkId) -> Option<Entity> {
        self.registry.entity(id)
    }

    /// Network id bound to an entity.
    #[must_use]
    pub fn network_id(&self, entity: Entity) -> Option<NetworkId> {
        self.registry.network_id(entity)
    }

    /// Entity bound to a network id, checked against its marker.
    ///
    /// # Errors
    ///
    /// Returns `UnknownNetworkId` if the id is unbound or the entity's
    /// marker carries a different id.
    pub fn resolve(&self, world: &World, id: NetworkId) -> ReplicationResult<Entity> {
        self.registry
            .entity(id)
            .filter(|&entity| is_bound_to(world, entity, id))
            .ok_or(ReplicationError::UnknownNetworkId(id))
    }

    /// Returns true if this peer is authoritative for the id.
    #[must_use]
    pub fn owns(&self, world: &World, id: NetworkId) -> bool {
        self.resolve(world, id).is_ok_and(|entity| {
            world
                .get_component::<Networked>(entity)
                .is_ok_and(|networked| networked.is_local)
        })
    }

    /// Peer id the host assigned to a connection.
    #[must_use]
    pub fn peer_of(&self, connection: ConnectionId) -> Option<PeerId> {
        self.peers.get(&connection).copied()
    }

    /// Connection owning an id, as the host sees it.
    #[must_use]
    pub fn owner_connection(&self, id: NetworkId) -> Option<ConnectionId> {
        self.registry.owner(id)
    }

    /// Number of joined peers (host only).
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Current handshake state.
    #[must_use]
    pub const fn handshake(&self) -> HandshakeState {
        self.handshake
    }

    /// Id bookkeeping.
    #[must_use]
    pub const fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }

    /// Component codecs.
    #[must_use]
    pub const fn codec(&self) -> &ComponentCodec {
        &self.codec
    }

    /// Replication settings.
    #[must_use]
    pub const fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// The underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// The underlying transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Counters.
    #[must_use]
    pub const fn stats(&self) -> ReplicationStats {
        self.stats
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Handles pending transport events, at most
    /// `max_messages_per_poll` of them. Returns how many were handled.
    pub fn poll(&mut self, world: &mut World) -> usize {
        self.prune_destroyed(world);
        let mut handled = 0;
        while handled < self.config.max_messages_per_poll {
            let Some(event) = self.transport.poll() else {
                break;
            };
            self.handle_event(world, event);
            handled += 1;
        }
        handled
    }

    /// Polls, then broadcasts changes of owned entities.
    ///
    /// # Errors
    ///
    /// Returns an error if an owned entity cannot be encoded.
    pub fn tick(&mut self, world: &mut World) -> ReplicationResult<usize> {
        self.poll(world);
        self.broadcast_changes(world)
    }

    // =========================================================================
    // Network identity
    // =========================================================================

    /// Asks the host for a network id (client only).
    ///
    /// The grant arrives asynchronously; check [`Self::pending_grant`]
    /// after polling.
    ///
    /// # Errors
    ///
    /// Returns `NotClient` on the host and `GrantOutstanding` while a
    /// request or an unused grant is pending. Nothing is sent on error.
    pub fn request_network_id(&mut self) -> ReplicationResult<()> {
        if self.is_host() {
            tracing::warn!("request_network_id called on the host; use allocate_network_id");
            return Err(ReplicationError::NotClient("request_network_id"));
        }
        if let Err(error) = self.handshake.begin() {
            tracing::warn!("Network id request rejected: {}", error);
            return Err(error);
        }
        self.send(SendTarget::Broadcast, &Message::ReserveIdRequest)?;
        tracing::debug!("Requested a network id");
        Ok(())
    }

    /// Allocates a network id directly (host only).
    ///
    /// # Errors
    ///
    /// Returns `HostOnly` on a client.
    pub fn allocate_network_id(&mut self) -> ReplicationResult<NetworkId> {
        if !self.is_host() {
            tracing::warn!("allocate_network_id called on a client; use request_network_id");
            return Err(ReplicationError::HostOnly("allocate_network_id"));
        }
        let id = self.allocator.allocate();
        self.registry.note_reserved(id);
        tracing::debug!("Allocated {}", id);
        Ok(id)
    }

    /// The granted id waiting to be bound, if any.
    #[must_use]
    pub const fn pending_grant(&self) -> Option<NetworkId> {
        self.handshake.pending()
    }

    /// Takes the pending grant without binding it.
    pub fn take_pending_grant(&mut self) -> Option<NetworkId> {
        self.handshake.take()
    }

    // =========================================================================
    // Owned entities
    // =========================================================================

    /// Binds a fully built entity to a claimed network id and announces it.
    ///
    /// Sends an `EntityInit` with every codec component the entity has,
    /// then attaches [`Networked`]. `synced` lists the components that
    /// delta updates carry, in send order.
    ///
    /// # Arguments
    ///
    /// * `entity` - A live entity without a network identity
    /// * `id` - The pending grant (client) or an allocated id (host)
    /// * `synced` - Wire ids of components to keep in sync
    ///
    /// # Errors
    ///
    /// Returns `GrantMismatch` if `id` was not granted to this peer,
    /// `NetworkIdInUse`, `AlreadyNetworked`, or a codec error for an
    /// unknown synced wire id.
    pub fn register_owned(
        &mut self,
        world: &mut World,
        entity: Entity,
        id: NetworkId,
        synced: Vec<WireId>,
    ) -> ReplicationResult<()> {
        self.check_claim(id, &synced)?;
        if !world.is_alive(entity) {
            return Err(EcsError::EntityNotAlive(entity).into());
        }
        if world.has_component::<Networked>(entity) {
            return Err(ReplicationError::AlreadyNetworked(entity));
        }

        let frames = self.codec.encode_attached(world, entity)?;
        let bytes = self.encode(&Message::EntityInit {
            network_id: id,
            frames: frames.clone(),
        })?;

        world.add_component(entity, Networked::owned(id, synced))?;
        if let Err(error) = self.bind(world, id, entity) {
            world.remove_component::<Networked>(entity)?;
            return Err(error);
        }
        if !self.is_host() {
            self.handshake.take();
        }
        self.cache.seed(id, &frames);
        self.deliver(SendTarget::Broadcast, &bytes, Delivery::Reliable);

        tracing::info!("Registered {} as owned {} ({} components)", entity, id, frames.len());
        Ok(())
    }

    /// Creates an entity, lets `build` attach its components, then
    /// registers it as owned.
    ///
    /// The entity is destroyed again if `build` or registration fails.
    ///
    /// # Errors
    ///
    /// As [`Self::register_owned`], plus any error from `build`.
    pub fn spawn_owned<F>(
        &mut self,
        world: &mut World,
        id: NetworkId,
        synced: Vec<WireId>,
        build: F,
    ) -> ReplicationResult<Entity>
    where
        F: FnOnce(&mut World, Entity) -> EcsResult<()>,
    {
        self.check_claim(id, &synced)?;

        let entity = world.create_entity()?;
        let registered = build(world, entity)
            .map_err(ReplicationError::from)
            .and_then(|()| self.register_owned(world, entity, id, synced));
        if let Err(error) = registered {
            world.destroy_entity(entity)?;
            return Err(error);
        }
        Ok(entity)
    }

    /// Re-sends the full state of an owned entity.
    ///
    /// # Errors
    ///
    /// Returns `UnknownNetworkId` or `NotOwner`.
    pub fn send_entity_init(&mut self, world: &World, id: NetworkId) -> ReplicationResult<()> {
        let entity = self.resolve(world, id)?;
        if !world.get_component::<Networked>(entity)?.is_local {
            return Err(ReplicationError::NotOwner {
                network_id: id,
                peer: self.local_peer,
            });
        }
        let frames = self.codec.encode_attached(world, entity)?;
        self.send(SendTarget::Broadcast, &Message::EntityInit { network_id: id, frames })
    }

    /// Hands authority over an entity to another peer.
    ///
    /// The host may move any entity and applies the move at once. A client
    /// may only ask to move one it owns; it stays the owner until the
    /// host's rebroadcast of the transfer arrives, and keeps it if the host
    /// rejects the request.
    ///
    /// # Errors
    ///
    /// Returns `UnknownNetworkId`, `NotOwner` on a client that does not own
    /// the entity, or `UnknownPeer` on the host for a peer not in the
    /// session.
    pub fn transfer_ownership(
        &mut self,
        world: &mut World,
        id: NetworkId,
        new_owner: PeerId,
    ) -> ReplicationResult<()> {
        let entity = self.resolve(world, id)?;
        let message = Message::OwnershipTransfer {
            network_id: id,
            new_owner,
        };

        if !self.is_host() {
            if !world.get_component::<Networked>(entity)?.is_local {
                tracing::warn!("Transfer of {} rejected: not owned by this peer", id);
                return Err(ReplicationError::NotOwner {
                    network_id: id,
                    peer: self.local_peer,
                });
            }
            // Applied when the host's rebroadcast comes back
            self.send(SendTarget::Broadcast, &message)?;
            tracing::info!("Asked host to transfer {} to {}", id, new_owner);
            return Ok(());
        }

        let owner_connection = self.connection_of(new_owner)?;
        self.send(SendTarget::Broadcast, &message)?;
        self.apply_transfer(world, entity, id, new_owner)?;
        self.set_owner_row(id, owner_connection);
        tracing::info!("Transferred {} to {}", id, new_owner);
        Ok(())
    }

    /// Removes a networked entity locally. Nothing is sent.
    ///
    /// # Errors
    ///
    /// Returns `UnknownNetworkId` if the id is unbound.
    pub fn despawn(&mut self, world: &mut World, id: NetworkId) -> ReplicationResult<()> {
        let entity = self
            .live_entity(world, id)
            .ok_or(ReplicationError::UnknownNetworkId(id))?;
        self.forget(id);
        world.destroy_entity(entity)?;
        tracing::debug!("Despawned {} ({})", id, entity);
        Ok(())
    }

    // =========================================================================
    // Delta sync
    // =========================================================================

    /// Sends one batch update per owned entity whose synced components
    /// changed since they were last sent. Returns how many were sent.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a component no longer fits in a frame.
    pub fn broadcast_changes(&mut self, world: &World) -> ReplicationResult<usize> {
        self.prune_destroyed(world);
        let mut sent = 0;
        for &entity in world.system_entities::<Self>()? {
            let networked = world.get_component::<Networked>(entity)?;
            if !networked.is_local {
                continue;
            }

            let mut frames = Vec::with_capacity(networked.synced.len());
            for &wire_id in &networked.synced {
                if let Some(frame) = self.codec.encode_frame(world, entity, wire_id)? {
                    frames.push(frame);
                }
            }

            let changed = self.cache.changed(networked.id, frames);
            if changed.is_empty() {
                continue;
            }
            self.send(
                SendTarget::Broadcast,
                &Message::ComponentBatchUpdate {
                    network_id: networked.id,
                    frames: changed,
                },
            )?;
            sent += 1;
        }
        Ok(sent)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn check_claim(&self, id: NetworkId, synced: &[WireId]) -> ReplicationResult<()> {
        if !id.is_valid() {
            return Err(ReplicationError::InvalidNetworkId);
        }
        if self.registry.contains(id) {
            return Err(ReplicationError::NetworkIdInUse(id));
        }
        if let Some(&wire_id) = synced.iter().find(|&&wire_id| !self.codec.knows(wire_id)) {
            return Err(CodecError::UnknownWireId(wire_id).into());
        }

        let claimable = if self.is_host() {
            self.registry.is_reserved(id) && self.registry.owner(id).is_none()
        } else {
            self.handshake.pending() == Some(id)
        };
        if !claimable {
            return Err(ReplicationError::GrantMismatch {
                requested: id,
                pending: self.handshake.pending(),
            });
        }
        Ok(())
    }

    /// Entity bound to an id, dropping the row if the entity is gone.
    fn live_entity(&mut self, world: &World, id: NetworkId) -> Option<Entity> {
        let entity = self.registry.entity(id)?;
        if is_bound_to(world, entity, id) {
            return Some(entity);
        }
        tracing::debug!("Forgetting {}: {} no longer carries it", id, entity);
        self.forget(id);
        None
    }

    /// Binds an entity that already carries its marker.
    fn bind(&mut self, world: &World, id: NetworkId, entity: Entity) -> ReplicationResult<()> {
        // A row left on a recycled slot
        if let Some(previous) = self.registry.network_id(entity) {
            self.live_entity(world, previous);
        }
        if self.registry.bind(id, entity) {
            Ok(())
        } else {
            Err(ReplicationError::NetworkIdInUse(id))
        }
    }

    fn forget(&mut self, id: NetworkId) {
        self.registry.unbind(id);
        self.cache.clear(id);
    }

    /// Drops every row whose entity left this system's matched set.
    fn prune_destroyed(&mut self, world: &World) {
        let stale: Vec<NetworkId> = self
            .registry
            .bindings()
            .filter(|&(id, entity)| !is_bound_to(world, entity, id))
            .map(|(id, _)| id)
            .collect();
        for &id in &stale {
            self.forget(id);
        }
        if !stale.is_empty() {
            tracing::debug!("Forgot {} destroyed networked entities", stale.len());
        }
    }

    fn apply_transfer(
        &mut self,
        world: &mut World,
        entity: Entity,
        id: NetworkId,
        new_owner: PeerId,
    ) -> ReplicationResult<()> {
        let is_local = self.local_peer == Some(new_owner);
        world.get_component_mut::<Networked>(entity)?.is_local = is_local;
        self.cache.clear(id);
        Ok(())
    }

    /// Connection of a peer; `None` for the host itself.
    fn connection_of(&self, peer: PeerId) -> ReplicationResult<Option<ConnectionId>> {
        if peer == PeerId::HOST {
            return Ok(None);
        }
        self.peers
            .iter()
            .find(|&(_, &joined)| joined == peer)
            .map(|(&connection, _)| Some(connection))
            .ok_or(ReplicationError::UnknownPeer(peer))
    }

    fn set_owner_row(&mut self, id: NetworkId, connection: Option<ConnectionId>) {
        match connection {
            Some(connection) => self.registry.set_owner(id, connection),
            None => self.registry.clear_owner(id),
        }
    }

    fn encode(&mut self, message: &Message) -> ReplicationResult<Vec<u8>> {
        let bytes = message.encode(self.sequence)?;
        tracing::trace!("Encoded {:?} #{}", message.message_type(), self.sequence);
        self.sequence = self.sequence.wrapping_add(1);
        Ok(bytes)
    }

    fn deliver(&mut self, target: SendTarget, bytes: &[u8], delivery: Delivery) {
        self.transport.send(target, bytes, delivery);
        self.stats.messages_sent += 1;
    }

    fn send(&mut self, target: SendTarget, message: &Message) -> ReplicationResult<()> {
        let bytes = self.encode(message)?;
        self.deliver(target, &bytes, delivery_for(message));
        Ok(())
    }

    fn relay(&mut self, target: SendTarget, bytes: &[u8], delivery: Delivery) {
        self.transport.send(target, bytes, delivery);
        self.stats.messages_relayed += 1;
    }
}

impl<T: Transport + 'static> System for ReplicationSystem<T> {
    fn update(&mut self, world: &mut World, _dt: f32) {
        if let Err(error) = self.broadcast_changes(world) {
            tracing::warn!("Broadcasting changes failed: {}", error);
        }
    }
}

/// Returns true if the entity is alive and its marker carries `id`.
fn is_bound_to(world: &World, entity: Entity, id: NetworkId) -> bool {
    world
        .get_component::<Networked>(entity)
        .is_ok_and(|networked| networked.id == id)
}

const fn delivery_for(message: &Message) -> Delivery {
    if message.is_reliable() {
        Delivery::Reliable
    } else {
        Delivery::Unreliable
    }
}
