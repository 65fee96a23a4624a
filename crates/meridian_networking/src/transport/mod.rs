//! # Transport Layer
//!
//! The byte channel replication runs on. Anything that can deliver byte
//! buffers to one connection or to all of them, reliably or not, and
//! report connection changes, can carry the protocol.
//!
//! ## Design
//!
//! - Non-blocking: `poll` returns `None` when nothing is queued
//! - Star topology: a client has exactly one connection, to the host
//! - Connection handles are opaque and only meaningful to their endpoint

mod loopback;

pub use loopback::{LoopbackNetwork, LoopbackTransport, HOST_CONNECTION};

use std::fmt;

/// Opaque connection handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Delivery guarantee for a send.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Delivery {
    /// Delivered once, in order.
    Reliable,
    /// May be dropped or reordered.
    Unreliable,
}

/// Who receives a send.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SendTarget {
    /// One connection.
    Connection(ConnectionId),
    /// Every connection of this endpoint. For a client that is the host.
    Broadcast,
    /// Every connection except one.
    BroadcastExcept(ConnectionId),
}

/// Something the transport observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A connection came up.
    Connected(ConnectionId),
    /// A connection went away; sends to it are dropped from now on.
    Disconnected(ConnectionId),
    /// Bytes arrived.
    Message {
        /// Sender.
        connection: ConnectionId,
        /// Payload.
        bytes: Vec<u8>,
    },
}

/// A byte channel between peers.
pub trait Transport {
    /// Returns true if this endpoint is the session host.
    fn is_host(&self) -> bool;

    /// Sends bytes. Failures are counted in stats, never reported.
    fn send(&mut self, target: SendTarget, bytes: &[u8], delivery: Delivery);

    /// Takes the next pending event without blocking.
    fn poll(&mut self) -> Option<TransportEvent>;

    /// Returns statistics.
    fn stats(&self) -> TransportStats;
}

/// Transport statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Packets sent.
    pub packets_sent: u64,
    /// Packets received.
    pub packets_received: u64,
    /// Bytes sent.
    pub bytes_sent: u64,
    /// Bytes received.
    pub bytes_received: u64,
    /// Sends dropped (closed or full connection).
    pub send_errors: u64,
}
