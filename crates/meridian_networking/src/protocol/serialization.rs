//! # Message Serialization
//!
//! Little-endian, byte-packed readers and writers for the wire format.
//!
//! ## Design
//!
//! - The writer appends to a growable buffer; only frame lengths are capped
//! - The reader never panics: every read returns `None` past the end
//! - Multi-byte fields are encoded explicitly, never by struct layout

use super::ids::{NetworkId, PeerId, WireId};
use super::messages::{ComponentFrame, MessageHeader, MessageType};
use super::{ProtocolError, ProtocolResult};

/// Message writer - appends fields to an owned buffer.
#[derive(Debug, Default)]
pub struct MessageWriter {
    buffer: Vec<u8>,
}

impl MessageWriter {
    /// Creates an empty writer.
    #[must_use]
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Creates a writer with pre-allocated space.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns a slice of the written data.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the writer, returning the buffer.
    #[inline]
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Writes a u16 in little-endian format.
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a u32 in little-endian format.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes an i32 in little-endian format.
    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a f32 in little-endian format.
    #[inline]
    pub fn write_f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a bool as one byte.
    #[inline]
    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Writes bytes prefixed by their u16 length.
    ///
    /// # Errors
    ///
    /// Returns `FieldTooLarge` if the length does not fit in a u16.
    pub fn write_len_prefixed(&mut self, bytes: &[u8]) -> ProtocolResult<()> {
        let len = u16::try_from(bytes.len())
            .map_err(|_| ProtocolError::FieldTooLarge { len: bytes.len() })?;
        self.write_u16(len);
        self.write_bytes(bytes);
        Ok(())
    }

    /// Writes a message header.
    #[inline]
    pub fn write_header(&mut self, header: MessageHeader) {
        self.write_u8(header.message_type as u8);
        self.write_u32(header.sequence);
    }

    /// Writes a network id.
    #[inline]
    pub fn write_network_id(&mut self, id: NetworkId) {
        self.write_u32(id.0);
    }

    /// Writes a peer id.
    #[inline]
    pub fn write_peer_id(&mut self, id: PeerId) {
        self.write_u32(id.0);
    }

    /// Writes one component frame.
    ///
    /// # Errors
    ///
    /// Returns `FieldTooLarge` if the frame body exceeds `u16::MAX` bytes.
    pub fn write_frame(&mut self, frame: &ComponentFrame) -> ProtocolResult<()> {
        self.write_u8(frame.wire_id.0);
        self.write_len_prefixed(&frame.bytes)
    }
}

/// Message reader - reads fields from a borrowed buffer.
#[derive(Debug)]
pub struct MessageReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> MessageReader<'a> {
    /// Creates a new reader over a buffer.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Returns the number of bytes remaining.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Returns the number of bytes consumed.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Reads `len` raw bytes.
    #[inline]
    pub fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.position.checked_add(len)?;
        let bytes = self.buffer.get(self.position..end)?;
        self.position = end;
        Some(bytes)
    }

    /// Reads a fixed-size array.
    #[inline]
    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.read_bytes(N)?.try_into().ok()
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Option<u8> {
        self.read_array::<1>().map(|[value]| value)
    }

    /// Reads a u16 in little-endian format.
    #[inline]
    pub fn read_u16(&mut self) -> Option<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    /// Reads a u32 in little-endian format.
    #[inline]
    pub fn read_u32(&mut self) -> Option<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Reads an i32 in little-endian format.
    #[inline]
    pub fn read_i32(&mut self) -> Option<i32> {
        self.read_array().map(i32::from_le_bytes)
    }

    /// Reads a f32 in little-endian format.
    #[inline]
    pub fn read_f32(&mut self) -> Option<f32> {
        self.read_u32().map(f32::from_bits)
    }

    /// Reads a one-byte bool; any non-zero byte is true.
    #[inline]
    pub fn read_bool(&mut self) -> Option<bool> {
        self.read_u8().map(|value| value != 0)
    }

    /// Reads bytes prefixed by their u16 length.
    #[inline]
    pub fn read_len_prefixed(&mut self) -> Option<&'a [u8]> {
        let len = self.read_u16()?;
        self.read_bytes(usize::from(len))
    }

    /// Reads a message header.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if fewer than five bytes remain, or
    /// `UnknownMessageType` for an unassigned type byte.
    pub fn read_header(&mut self) -> ProtocolResult<MessageHeader> {
        let tag = self.read_u8().ok_or(self.truncated(MessageHeader::SIZE))?;
        let message_type = MessageType::from_u8(tag).ok_or(ProtocolError::UnknownMessageType(tag))?;
        let sequence = self
            .read_u32()
            .ok_or(self.truncated(MessageHeader::SIZE - 1))?;
        Ok(MessageHeader {
            message_type,
            sequence,
        })
    }

    /// Reads one component frame, or `None` if it does not fit.
    pub fn read_frame(&mut self) -> Option<ComponentFrame> {
        let wire_id = WireId(self.read_u8()?);
        let bytes = self.read_len_prefixed()?;
        Some(ComponentFrame {
            wire_id,
            bytes: bytes.to_vec(),
        })
    }

    /// Builds a truncation error for a field of `needed` bytes.
    pub(crate) fn truncated(&self, needed: usize) -> ProtocolError {
        ProtocolError::Truncated {
            needed,
            available: self.remaining(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_layout() {
        let mut writer = MessageWriter::new();
        writer.write_u16(0x0102);
        writer.write_u32(0x0304_0506);

        assert_eq!(writer.as_slice(), &[0x02, 0x01, 0x06, 0x05, 0x04, 0x03]);
    }

    #[test]
    fn test_header_is_five_bytes() {
        let mut writer = MessageWriter::new();
        writer.write_header(MessageHeader {
            message_type: MessageType::IdGranted,
            sequence: 7,
        });

        assert_eq!(writer.as_slice(), &[6, 7, 0, 0, 0]);
        let header = MessageReader::new(writer.as_slice()).read_header().unwrap();
        assert_eq!(header.message_type, MessageType::IdGranted);
        assert_eq!(header.sequence, 7);
    }

    #[test]
    fn test_reads_past_end_return_none() {
        let mut reader = MessageReader::new(&[1, 2, 3]);
        assert_eq!(reader.read_u32(), None);
        // A failed read consumes nothing
        assert_eq!(reader.remaining(), 3);
        assert_eq!(reader.read_u16(), Some(0x0201));
        assert_eq!(reader.read_u16(), None);
        assert_eq!(reader.read_u8(), Some(3));
        assert_eq!(reader.read_u8(), None);
    }

    #[test]
    fn test_frame_layout() {
        let mut writer = MessageWriter::new();
        writer
            .write_frame(&ComponentFrame {
                wire_id: WireId(3),
                bytes: vec![0xAA, 0xBB],
            })
            .unwrap();

        assert_eq!(writer.as_slice(), &[3, 2, 0, 0xAA, 0xBB]);
    }

    #[test]
    fn test_truncated_frame() {
        // Claims 4 body bytes, carries 2
        let mut reader = MessageReader::new(&[3, 4, 0, 0xAA, 0xBB]);
        assert!(reader.read_frame().is_none());
    }

    #[test]
    fn test_oversized_field_is_rejected() {
        let mut writer = MessageWriter::new();
        let big = vec![0u8; usize::from(u16::MAX) + 1];
        assert_eq!(
            writer.write_len_prefixed(&big),
            Err(ProtocolError::FieldTooLarge { len: big.len() })
        );
    }

    #[test]
    fn test_unknown_message_type() {
        let mut reader = MessageReader::new(&[2, 0, 0, 0, 0]);
        assert_eq!(reader.read_header(), Err(ProtocolError::UnknownMessageType(2)));
    }
}
