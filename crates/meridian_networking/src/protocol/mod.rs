//! # Wire Protocol
//!
//! Binary message definitions for identity handshake and replication.
//!
//! ## Message Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (5 bytes)                                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Type (1) │ Sequence (4, LE)                                  │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Body (per type)                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! | Type | Tag | Body |
//! |------|-----|------|
//! | `JoinRequest` | 0 | - |
//! | `JoinAccept` | 1 | `peer_id: u32` |
//! | `ReserveIdRequest` | 4 | - |
//! | `IdReserved` | 5 | `network_id: u32` |
//! | `IdGranted` | 6 | `network_id: u32` |
//! | `EntityInit` | 7 | `network_id: u32, count: u32, frames` |
//! | `ComponentBatchUpdate` | 8 | `network_id: u32, count: u32, frames` |
//! | `OwnershipTransfer` | 9 | `network_id: u32, new_owner: u32` |
//!
//! A frame is `wire_id: u8, length: u16 (LE), bytes[length]`.
//!
//! ## Design Philosophy
//!
//! - Every integer is little-endian and byte-packed
//! - A malformed message is dropped, never half-applied
//! - Reliable delivery for everything except batch updates

mod ids;
mod messages;
mod serialization;

pub use ids::{NetworkId, PeerId, WireId};
pub use messages::{ComponentFrame, Message, MessageHeader, MessageType};
pub use serialization::{MessageReader, MessageWriter};

use thiserror::Error;

/// Protocol errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The message ends before a required field.
    #[error("Message truncated: needed {needed} bytes, {available} available")]
    Truncated {
        /// Bytes the field needs.
        needed: usize,
        /// Bytes left in the message.
        available: usize,
    },

    /// The type tag is not assigned.
    #[error("Unknown message type: {0}")]
    UnknownMessageType(u8),

    /// A length-prefixed field exceeds `u16::MAX` bytes.
    #[error("Field too large for a u16 length prefix: {len} bytes")]
    FieldTooLarge {
        /// Field length.
        len: usize,
    },

    /// A message carries more frames than a u32 can count.
    #[error("Too many frames in one message: {0}")]
    TooManyFrames(usize),
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
