//! # Meridian Networking
//!
//! Host-authoritative replication of ECS entities between one host and any
//! number of clients.
//!
//! ## Architecture
//!
//! - **Protocol**: Little-endian, byte-packed messages with a 5-byte header
//! - **Codec**: Stable wire ids per component type, raw or custom encoding
//! - **Identity**: The host allocates every network id (reserve / grant)
//! - **Replication**: Entity inits, delta batch updates, ownership transfer
//! - **Transport**: Anything implementing [`Transport`]; an in-process
//!   loopback ships for tests and demos
//!
//! ## Authority Model
//!
//! ```text
//! OWNER                            HOST                           OTHERS
//!   |                                |                               |
//!   |--- EntityInit / Update ------->|                               |
//!   |                                |--- relayed, byte for byte --->|
//!   |                                |                               |
//! ```
//!
//! Exactly one peer is authoritative for each entity. Shadows apply what
//! arrives and never send.
//!
//! ## Example
//!
//! ```rust,ignore
//! use meridian_core::World;
//! use meridian_networking::{components, LoopbackNetwork, ReplicationConfig, ReplicationSystem};
//!
//! let (network, host_transport) = LoopbackNetwork::new();
//! let mut world = World::new(10_000);
//! let mut host = ReplicationSystem::new(
//!     &mut world,
//!     host_transport,
//!     components::standard_codec()?,
//!     ReplicationConfig::default(),
//! )?;
//!
//! host.poll(&mut world);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod codec;
pub mod components;
pub mod config;
pub mod protocol;
pub mod replication;
pub mod transport;

// Re-exports for convenience
pub use codec::{CodecError, CodecResult, ComponentCodec};
pub use config::{ConfigError, ReplicationConfig, SessionConfig};
pub use protocol::{
    ComponentFrame, Message, MessageHeader, MessageType, NetworkId, PeerId, ProtocolError,
    ProtocolResult, WireId,
};
pub use replication::{
    HandshakeState, Networked, ReplicationError, ReplicationResult, ReplicationStats,
    ReplicationSystem,
};
pub use transport::{
    ConnectionId, Delivery, LoopbackNetwork, LoopbackTransport, SendTarget, Transport,
    TransportEvent, TransportStats, HOST_CONNECTION,
};

/// Transport events handled per `poll` by default.
pub const DEFAULT_POLL_BATCH: usize = 32;
