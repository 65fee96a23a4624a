//! Replication errors.

use crate::codec::CodecError;
use crate::protocol::{NetworkId, PeerId, ProtocolError};
use meridian_core::{EcsError, Entity};
use thiserror::Error;

/// Errors from local replication calls.
///
/// Inbound traffic never produces these for the caller: malformed or
/// out-of-order messages are logged and dropped inside `poll`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplicationError {
    /// Operation reserved for clients was called on the host.
    #[error("{0} is a client operation; the host allocates ids directly")]
    NotClient(&'static str),

    /// Operation reserved for the host was called on a client.
    #[error("{0} can only run on the host")]
    HostOnly(&'static str),

    /// A reservation is already in flight.
    #[error("A network id request is already outstanding")]
    GrantOutstanding,

    /// No granted id is waiting to be used.
    #[error("No granted network id is pending")]
    NoPendingGrant,

    /// The id passed does not match the pending grant.
    #[error("{requested} was not granted to this peer (pending: {pending:?})")]
    GrantMismatch {
        /// Id the caller passed.
        requested: NetworkId,
        /// Id actually pending.
        pending: Option<NetworkId>,
    },

    /// The id is already bound to a local entity.
    #[error("{0} is already bound to an entity")]
    NetworkIdInUse(NetworkId),

    /// The invalid id (0) was passed.
    #[error("Network id 0 is invalid")]
    InvalidNetworkId,

    /// No local entity is bound to the id.
    #[error("{0} is not bound to any entity")]
    UnknownNetworkId(NetworkId),

    /// The acting peer is not authoritative for the entity.
    #[error("{network_id} is not owned by the acting peer ({peer:?})")]
    NotOwner {
        /// Entity id.
        network_id: NetworkId,
        /// Peer that attempted the operation, `None` if it has not joined.
        peer: Option<PeerId>,
    },

    /// No connected peer has this identity.
    #[error("{0} is not part of the session")]
    UnknownPeer(PeerId),

    /// The entity already carries a network identity.
    #[error("{0} already has a network identity")]
    AlreadyNetworked(Entity),

    /// ECS error.
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// Codec error.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Protocol error.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Result type for replication operations.
pub type ReplicationResult<T> = Result<T, ReplicationError>;
