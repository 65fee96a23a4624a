//! # Message Definitions
//!
//! Every message the replication protocol sends. Encoding is explicit and
//! little-endian; see the module docs of [`crate::protocol`] for layouts.

use super::ids::{NetworkId, PeerId, WireId};
use super::serialization::{MessageReader, MessageWriter};
use super::{ProtocolError, ProtocolResult};

/// Types of messages in the protocol.
///
/// The numeric values are the wire tag. 2 and 3 are reserved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Client -> Host: ask to join the session.
    JoinRequest = 0,
    /// Host -> Client: join accepted, carries the assigned peer id.
    JoinAccept = 1,
    /// Client -> Host: ask for a fresh network id.
    ReserveIdRequest = 4,
    /// Host -> All: an id was handed out (informational).
    IdReserved = 5,
    /// Host -> Requester: the id now belongs to you.
    IdGranted = 6,
    /// Owner -> All: full component set of a new entity.
    EntityInit = 7,
    /// Owner -> All: changed components of an entity.
    ComponentBatchUpdate = 8,
    /// Any -> All: authority over an entity moves to another peer.
    OwnershipTransfer = 9,
}

impl MessageType {
    /// Parses a wire tag.
    #[must_use]
    pub const fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::JoinRequest),
            1 => Some(Self::JoinAccept),
            4 => Some(Self::ReserveIdRequest),
            5 => Some(Self::IdReserved),
            6 => Some(Self::IdGranted),
            7 => Some(Self::EntityInit),
            8 => Some(Self::ComponentBatchUpdate),
            9 => Some(Self::OwnershipTransfer),
            _ => None,
        }
    }
}

/// Message header - present in every message.
///
/// Total size: 5 bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    /// Wire tag.
    pub message_type: MessageType,
    /// Sender's running message counter.
    pub sequence: u32,
}

impl MessageHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 5;
}

/// One encoded component inside an init or batch update.
///
/// Layout: `wire_id: u8, length: u16, bytes[length]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentFrame {
    /// Which component this is.
    pub wire_id: WireId,
    /// Codec output.
    pub bytes: Vec<u8>,
}

impl ComponentFrame {
    /// Size of the frame prefix in bytes.
    pub const HEADER_SIZE: usize = 3;

    /// Encoded size of the whole frame.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        Self::HEADER_SIZE + self.bytes.len()
    }
}

/// All messages in the protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// Client asks to join.
    JoinRequest,
    /// Host assigns the client's peer id.
    JoinAccept {
        /// The client's identity for this session.
        peer_id: PeerId,
    },
    /// Client asks for a network id.
    ReserveIdRequest,
    /// Host announces an allocated id.
    IdReserved {
        /// The allocated id.
        network_id: NetworkId,
    },
    /// Host grants an id to the requester.
    IdGranted {
        /// The granted id.
        network_id: NetworkId,
    },
    /// Full component set of an entity.
    EntityInit {
        /// Entity identity.
        network_id: NetworkId,
        /// Every attached, registered component.
        frames: Vec<ComponentFrame>,
    },
    /// Changed components of an entity.
    ComponentBatchUpdate {
        /// Entity identity.
        network_id: NetworkId,
        /// Only the components whose encoding changed.
        frames: Vec<ComponentFrame>,
    },
    /// Authority over an entity moves.
    OwnershipTransfer {
        /// Entity identity.
        network_id: NetworkId,
        /// Peer that becomes authoritative.
        new_owner: PeerId,
    },
}

impl Message {
    /// Returns the wire tag of this message.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::JoinRequest => MessageType::JoinRequest,
            Self::JoinAccept { .. } => MessageType::JoinAccept,
            Self::ReserveIdRequest => MessageType::ReserveIdRequest,
            Self::IdReserved { .. } => MessageType::IdReserved,
            Self::IdGranted { .. } => MessageType::IdGranted,
            Self::EntityInit { .. } => MessageType::EntityInit,
            Self::ComponentBatchUpdate { .. } => MessageType::ComponentBatchUpdate,
            Self::OwnershipTransfer { .. } => MessageType::OwnershipTransfer,
        }
    }

    /// Returns true if this message travels on the reliable channel.
    #[must_use]
    pub const fn is_reliable(&self) -> bool {
        !matches!(self, Self::ComponentBatchUpdate { .. })
    }

    /// Encodes the message with the given sequence number.
    ///
    /// # Errors
    ///
    /// Returns `FieldTooLarge` if a frame body exceeds `u16::MAX` bytes,
    /// or `TooManyFrames` if the frame count does not fit in a u32.
    pub fn encode(&self, sequence: u32) -> ProtocolResult<Vec<u8>> {
        let mut writer = MessageWriter::with_capacity(self.encoded_len_hint());
        writer.write_header(MessageHeader {
            message_type: self.message_type(),
            sequence,
        });

        match self {
            Self::JoinRequest | Self::ReserveIdRequest => {}
            Self::JoinAccept { peer_id } => writer.write_peer_id(*peer_id),
            Self::IdReserved { network_id } | Self::IdGranted { network_id } => {
                writer.write_network_id(*network_id);
            }
            Self::EntityInit { network_id, frames }
            | Self::ComponentBatchUpdate { network_id, frames } => {
                let count = u32::try_from(frames.len())
                    .map_err(|_| ProtocolError::TooManyFrames(frames.len()))?;
                writer.write_network_id(*network_id);
                writer.write_u32(count);
                for frame in frames {
                    writer.write_frame(frame)?;
                }
            }
            Self::OwnershipTransfer {
                network_id,
                new_owner,
            } => {
                writer.write_network_id(*network_id);
                writer.write_peer_id(*new_owner);
            }
        }

        Ok(writer.into_bytes())
    }

    /// Decodes a message.
    ///
    /// Fixed fields must be present. Frames of an init or batch update are
    /// read until `component_count` is reached or the next frame does not
    /// fit; frames past that point are dropped.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if a fixed field is missing, or
    /// `UnknownMessageType` for an unassigned tag.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<(MessageHeader, Self)> {
        let mut reader = MessageReader::new(bytes);
        let header = reader.read_header()?;

        let message = match header.message_type {
            MessageType::JoinRequest => Self::JoinRequest,
            MessageType::ReserveIdRequest => Self::ReserveIdRequest,
            MessageType::JoinAccept => Self::JoinAccept {
                peer_id: PeerId(read_u32(&mut reader)?),
            },
            MessageType::IdReserved => Self::IdReserved {
                network_id: NetworkId(read_u32(&mut reader)?),
            },
            MessageType::IdGranted => Self::IdGranted {
                network_id: NetworkId(read_u32(&mut reader)?),
            },
            MessageType::EntityInit => {
                let (network_id, frames) = read_frames(&mut reader)?;
                Self::EntityInit { network_id, frames }
            }
            MessageType::ComponentBatchUpdate => {
                let (network_id, frames) = read_frames(&mut reader)?;
                Self::ComponentBatchUpdate { network_id, frames }
            }
            MessageType::OwnershipTransfer => Self::OwnershipTransfer {
                network_id: NetworkId(read_u32(&mut reader)?),
                new_owner: PeerId(read_u32(&mut reader)?),
            },
        };

        Ok((header, message))
    }

    fn encoded_len_hint(&self) -> usize {
        let body = match self {
            Self::JoinRequest | Self::ReserveIdRequest => 0,
            Self::JoinAccept { .. } | Self::IdReserved { .. } | Self::IdGranted { .. } => 4,
            Self::OwnershipTransfer { .. } => 8,
            Self::EntityInit { frames, .. } | Self::ComponentBatchUpdate { frames, .. } => {
                8 + frames.iter().map(ComponentFrame::encoded_len).sum::<usize>()
            }
        };
        MessageHeader::SIZE + body
    }
}

fn read_u32(reader: &mut MessageReader<'_>) -> ProtocolResult<u32> {
    reader.read_u32().ok_or_else(|| reader.truncated(4))
}

fn read_frames(reader: &mut MessageReader<'_>) -> ProtocolResult<(NetworkId, Vec<ComponentFrame>)> {
    let network_id = NetworkId(read_u32(reader)?);
    let count = read_u32(reader)?;

    // Every frame costs at least its prefix, so the count can't outgrow the buffer
    let plausible = reader.remaining() / ComponentFrame::HEADER_SIZE;
    let mut frames = Vec::with_capacity((count as usize).min(plausible));
    for _ in 0..count {
        match reader.read_frame() {
            Some(frame) => frames.push(frame),
            None => break,
        }
    }
    Ok((network_id, frames))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(wire: u8, bytes: &[u8]) -> ComponentFrame {
        ComponentFrame {
            wire_id: WireId(wire),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_reserve_request_is_header_only() {
        let bytes = Message::ReserveIdRequest.encode(3).unwrap();
        assert_eq!(bytes, vec![4, 3, 0, 0, 0]);
    }

    #[test]
    fn test_granted_layout() {
        let bytes = Message::IdGranted {
            network_id: NetworkId(0x0102),
        }
        .encode(0)
        .unwrap();
        assert_eq!(bytes, vec![6, 0, 0, 0, 0, 0x02, 0x01, 0, 0]);
    }

    #[test]
    fn test_entity_init_layout() {
        let message = Message::EntityInit {
            network_id: NetworkId(9),
            frames: vec![frame(1, &[0xAA]), frame(3, &[])],
        };
        let bytes = message.encode(1).unwrap();

        let expected = vec![
            7, 1, 0, 0, 0, // header
            9, 0, 0, 0, // network id
            2, 0, 0, 0, // count
            1, 1, 0, 0xAA, // frame 1
            3, 0, 0, // frame 2
        ];
        assert_eq!(bytes, expected);

        let (header, decoded) = Message::decode(&bytes).unwrap();
        assert_eq!(header.sequence, 1);
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_truncated_trailing_frame_is_dropped() {
        let message = Message::ComponentBatchUpdate {
            network_id: NetworkId(2),
            frames: vec![frame(1, &[1, 2, 3, 4]), frame(2, &[5, 6, 7, 8])],
        };
        let mut bytes = message.encode(0).unwrap();
        bytes.truncate(bytes.len() - 2);

        let (_, decoded) = Message::decode(&bytes).unwrap();
        assert_eq!(
            decoded,
            Message::ComponentBatchUpdate {
                network_id: NetworkId(2),
                frames: vec![frame(1, &[1, 2, 3, 4])],
            }
        );
    }

    #[test]
    fn test_count_larger_than_payload() {
        let mut bytes = vec![8, 0, 0, 0, 0, 5, 0, 0, 0];
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&[4, 1, 0, 0x11]);

        let (_, decoded) = Message::decode(&bytes).unwrap();
        assert_eq!(
            decoded,
            Message::ComponentBatchUpdate {
                network_id: NetworkId(5),
                frames: vec![frame(4, &[0x11])],
            }
        );
    }

    #[test]
    fn test_missing_fixed_field() {
        // Ownership transfer without the new owner
        let bytes = [9, 0, 0, 0, 0, 1, 0, 0, 0];
        assert!(matches!(
            Message::decode(&bytes),
            Err(ProtocolError::Truncated { needed: 4, .. })
        ));

        // Header alone is too short
        assert!(matches!(
            Message::decode(&[7, 0]),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn test_reliability_classes() {
        assert!(Message::JoinRequest.is_reliable());
        assert!(Message::OwnershipTransfer {
            network_id: NetworkId(1),
            new_owner: PeerId(2)
        }
        .is_reliable());
        assert!(!Message::ComponentBatchUpdate {
            network_id: NetworkId(1),
            frames: Vec::new()
        }
        .is_reliable());
    }
}
