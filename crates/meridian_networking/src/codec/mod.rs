//! # Component Wire Codec
//!
//! Maps component types to stable [`WireId`]s and turns component values
//! into bytes and back.
//!
//! ## Encoding Rules
//!
//! - `register_raw` types are plain-old-data and are copied byte for byte
//! - `register_custom` types supply an encode/decode pair; fields that only
//!   make sense locally (texture handles, UI views, entity lists) are left out
//! - Decoding never fails on short input: missing fields keep their default
//!
//! ## Type Erasure
//!
//! Replication handles components it only knows by wire id. Each entry
//! keeps monomorphized function pointers that read a component from a
//! [`World`] or write one into it, so no per-type switch is needed.
//!
//! ```rust,ignore
//! let mut codec = ComponentCodec::new();
//! codec.register_raw::<Transform>(WireId(1))?;
//! codec.register_custom::<Sprite>(WireId(3), encode_sprite, decode_sprite)?;
//!
//! let frames = codec.encode_attached(&world, entity)?;
//! ```

use crate::protocol::{ComponentFrame, WireId};
use bytemuck::Pod;
use meridian_core::{Component, EcsError, Entity, World};
use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Encodes a component value.
pub type EncodeFn<C> = fn(&C) -> Vec<u8>;

/// Decodes a component value; must tolerate truncated input.
pub type DecodeFn<C> = fn(&[u8]) -> C;

/// Maximum encoded size of one component (frame length is a u16).
pub const MAX_COMPONENT_BYTES: usize = u16::MAX as usize;

/// Codec errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Component type registered twice.
    #[error("Component type already has a codec: {0}")]
    TypeAlreadyRegistered(&'static str),

    /// Wire id assigned twice.
    #[error("{wire_id} is already assigned to {existing}")]
    DuplicateWireId {
        /// Contested id.
        wire_id: WireId,
        /// Type that holds it.
        existing: &'static str,
    },

    /// Component type has no codec.
    #[error("Component type has no codec: {0}")]
    NotRegistered(&'static str),

    /// No codec uses this wire id.
    #[error("Unknown {0}")]
    UnknownWireId(WireId),

    /// Encoding does not fit in a frame.
    #[error("{wire_id} encoded to {len} bytes, frames hold at most 65535")]
    EncodingTooLarge {
        /// Component wire id.
        wire_id: WireId,
        /// Encoded length.
        len: usize,
    },

    /// The world rejected a decoded component.
    #[error(transparent)]
    Ecs(#[from] EcsError),
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

struct TypedCodec<C> {
    encode: EncodeFn<C>,
    decode: DecodeFn<C>,
}

struct CodecEntry {
    wire_id: WireId,
    type_name: &'static str,
    custom: bool,
    /// `TypedCodec<C>` for the registered `C`.
    typed: Box<dyn Any + Send + Sync>,
    encode_attached: fn(&dyn Any, &World, Entity) -> Option<Vec<u8>>,
    apply: fn(&dyn Any, &mut World, Entity, &[u8]) -> CodecResult<()>,
    register: fn(&mut World) -> CodecResult<()>,
}

/// Registry of component codecs.
///
/// Constructed explicitly and owned by whoever replicates; there is no
/// process-wide instance.
#[derive(Default)]
pub struct ComponentCodec {
    entries: Vec<CodecEntry>,
    by_type: HashMap<TypeId, usize>,
    by_wire: BTreeMap<WireId, usize>,
}

impl ComponentCodec {
    /// Creates an empty codec registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plain-old-data component with the byte-copy codec.
    ///
    /// # Errors
    ///
    /// Returns an error if the type or the wire id is already registered.
    pub fn register_raw<C: Component + Pod>(&mut self, wire_id: WireId) -> CodecResult<()> {
        self.insert::<C>(wire_id, raw_encode::<C>, raw_decode::<C>, false)
    }

    /// Registers a component with its own encode/decode pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the type or the wire id is already registered.
    pub fn register_custom<C: Component>(
        &mut self,
        wire_id: WireId,
        encode: EncodeFn<C>,
        decode: DecodeFn<C>,
    ) -> CodecResult<()> {
        self.insert::<C>(wire_id, encode, decode, true)
    }

    /// Encodes a component value.
    ///
    /// # Errors
    ///
    /// Returns `NotRegistered` for an unknown type, or `EncodingTooLarge`.
    pub fn encode<C: Component>(&self, component: &C) -> CodecResult<Vec<u8>> {
        let entry = self.entry::<C>()?;
        let bytes = (typed::<C>(entry)?.encode)(component);
        check_len(entry.wire_id, bytes)
    }

    /// Decodes a component value.
    ///
    /// # Errors
    ///
    /// Returns `NotRegistered` for an unknown type.
    pub fn decode<C: Component>(&self, bytes: &[u8]) -> CodecResult<C> {
        let entry = self.entry::<C>()?;
        Ok((typed::<C>(entry)?.decode)(bytes))
    }

    /// Returns the wire id of a registered type.
    ///
    /// # Errors
    ///
    /// Returns `NotRegistered` for an unknown type.
    pub fn wire_id<C: Component>(&self) -> CodecResult<WireId> {
        Ok(self.entry::<C>()?.wire_id)
    }

    /// Returns true if the type is registered.
    #[must_use]
    pub fn is_registered<C: Component>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<C>())
    }

    /// Returns true if the type uses a custom encode/decode pair.
    #[must_use]
    pub fn has_custom<C: Component>(&self) -> bool {
        self.entry::<C>().is_ok_and(|entry| entry.custom)
    }

    /// Returns true if some type uses this wire id.
    #[must_use]
    pub fn knows(&self, wire_id: WireId) -> bool {
        self.by_wire.contains_key(&wire_id)
    }

    /// Registered wire ids in ascending order.
    pub fn wire_ids(&self) -> impl Iterator<Item = WireId> + '_ {
        self.by_wire.keys().copied()
    }

    /// Name of the type behind a wire id.
    #[must_use]
    pub fn type_name_of(&self, wire_id: WireId) -> Option<&'static str> {
        self.wire_entry(wire_id).ok().map(|entry| entry.type_name)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encodes one component of an entity, `None` if it is not attached.
    ///
    /// # Errors
    ///
    /// Returns `UnknownWireId`, or `EncodingTooLarge`.
    pub fn encode_frame(
        &self,
        world: &World,
        entity: Entity,
        wire_id: WireId,
    ) -> CodecResult<Option<ComponentFrame>> {
        let entry = self.wire_entry(wire_id)?;
        match (entry.encode_attached)(entry.typed.as_ref(), world, entity) {
            Some(bytes) => Ok(Some(ComponentFrame {
                wire_id,
                bytes: check_len(wire_id, bytes)?,
            })),
            None => Ok(None),
        }
    }

    /// Encodes every registered component the entity has, by wire id.
    ///
    /// # Errors
    ///
    /// Returns `EncodingTooLarge` if any component does not fit a frame.
    pub fn encode_attached(&self, world: &World, entity: Entity) -> CodecResult<Vec<ComponentFrame>> {
        let mut frames = Vec::new();
        for wire_id in self.wire_ids() {
            if let Some(frame) = self.encode_frame(world, entity, wire_id)? {
                frames.push(frame);
            }
        }
        Ok(frames)
    }

    /// Decodes a frame and overwrites or attaches the component.
    ///
    /// # Errors
    ///
    /// Returns `UnknownWireId`, or the world's error if the entity is dead
    /// or the component type is not registered with the world.
    pub fn apply_frame(
        &self,
        world: &mut World,
        entity: Entity,
        frame: &ComponentFrame,
    ) -> CodecResult<()> {
        let entry = self.wire_entry(frame.wire_id)?;
        (entry.apply)(entry.typed.as_ref(), world, entity, &frame.bytes)
    }

    /// Registers every codec type with a world that does not have it yet.
    ///
    /// # Errors
    ///
    /// Returns the world's error, e.g. when signature bits run out.
    pub fn register_components(&self, world: &mut World) -> CodecResult<()> {
        for entry in &self.entries {
            (entry.register)(world)?;
        }
        Ok(())
    }

    fn insert<C: Component>(
        &mut self,
        wire_id: WireId,
        encode: EncodeFn<C>,
        decode: DecodeFn<C>,
        custom: bool,
    ) -> CodecResult<()> {
        if self.is_registered::<C>() {
            return Err(CodecError::TypeAlreadyRegistered(type_name::<C>()));
        }
        if let Some(&index) = self.by_wire.get(&wire_id) {
            return Err(CodecError::DuplicateWireId {
                wire_id,
                existing: self.entries[index].type_name,
            });
        }

        let index = self.entries.len();
        self.entries.push(CodecEntry {
            wire_id,
            type_name: type_name::<C>(),
            custom,
            typed: Box::new(TypedCodec { encode, decode }),
            encode_attached: encode_attached::<C>,
            apply: apply::<C>,
            register: register::<C>,
        });
        self.by_type.insert(TypeId::of::<C>(), index);
        self.by_wire.insert(wire_id, index);
        Ok(())
    }

    fn entry<C: Component>(&self) -> CodecResult<&CodecEntry> {
        self.by_type
            .get(&TypeId::of::<C>())
            .map(|&index| &self.entries[index])
            .ok_or(CodecError::NotRegistered(type_name::<C>()))
    }

    fn wire_entry(&self, wire_id: WireId) -> CodecResult<&CodecEntry> {
        self.by_wire
            .get(&wire_id)
            .map(|&index| &self.entries[index])
            .ok_or(CodecError::UnknownWireId(wire_id))
    }
}

fn typed<C: Component>(entry: &CodecEntry) -> CodecResult<&TypedCodec<C>> {
    entry
        .typed
        .downcast_ref()
        .ok_or(CodecError::NotRegistered(type_name::<C>()))
}

fn check_len(wire_id: WireId, bytes: Vec<u8>) -> CodecResult<Vec<u8>> {
    if bytes.len() > MAX_COMPONENT_BYTES {
        return Err(CodecError::EncodingTooLarge {
            wire_id,
            len: bytes.len(),
        });
    }
    Ok(bytes)
}

fn encode_attached<C: Component>(typed: &dyn Any, world: &World, entity: Entity) -> Option<Vec<u8>> {
    let codec = typed.downcast_ref::<TypedCodec<C>>()?;
    let component = world.get_component::<C>(entity).ok()?;
    Some((codec.encode)(component))
}

fn apply<C: Component>(
    typed: &dyn Any,
    world: &mut World,
    entity: Entity,
    bytes: &[u8],
) -> CodecResult<()> {
    let codec = typed
        .downcast_ref::<TypedCodec<C>>()
        .ok_or(CodecError::NotRegistered(type_name::<C>()))?;
    world.set_component(entity, (codec.decode)(bytes))?;
    Ok(())
}

fn register<C: Component>(world: &mut World) -> CodecResult<()> {
    if world.component_type::<C>().is_err() {
        world.register_component::<C>()?;
    }
    Ok(())
}

/// Byte-copy encoder for plain-old-data components.
#[must_use]
pub fn raw_encode<C: Pod>(component: &C) -> Vec<u8> {
    bytemuck::bytes_of(component).to_vec()
}

/// Byte-copy decoder for plain-old-data components.
///
/// The value starts zeroed and takes as many leading bytes as the input
/// provides, so a short buffer leaves the tail fields at zero.
#[must_use]
pub fn raw_decode<C: Pod>(bytes: &[u8]) -> C {
    let mut component = C::zeroed();
    let target = bytemuck::bytes_of_mut(&mut component);
    let len = target.len().min(bytes.len());
    target[..len].copy_from_slice(&bytes[..len]);
    component
}
