//! # Standard Components
//!
//! The game components that ship with the protocol, and their wire ids.
//!
//! Plain-old-data components use the byte-copy codec. Components holding
//! local resources get a custom codec that sends only the portable fields:
//!
//! | Component | Wire id | Codec | Not sent |
//! |-----------|---------|-------|----------|
//! | [`Transform`] | 1 | raw | - |
//! | [`Rigidbody`] | 2 | custom | hitbox (rebuilt from base size) |
//! | [`Sprite`] | 3 | custom | texture handle |
//! | [`Gravity`] | 4 | raw | - |
//! | [`Jump`] | 5 | raw | - |
//! | [`Inventory`] | 6 | custom | item entities |
//! | [`Item`] | 7 | custom | UI view |
//! | [`Player`] | 8 | raw | - |
//! | [`EntityState`] | 9 | raw | - |

use crate::codec::{CodecResult, ComponentCodec};
use crate::protocol::{MessageReader, MessageWriter, WireId};
use bytemuck::{Pod, Zeroable};
use meridian_core::{Entity, World};

/// Wire ids of the standard components. Never renumber these.
pub mod wire {
    use crate::protocol::WireId;

    /// [`Transform`](super::Transform)
    pub const TRANSFORM: WireId = WireId(1);
    /// [`Rigidbody`](super::Rigidbody)
    pub const RIGIDBODY: WireId = WireId(2);
    /// [`Sprite`](super::Sprite)
    pub const SPRITE: WireId = WireId(3);
    /// [`Gravity`](super::Gravity)
    pub const GRAVITY: WireId = WireId(4);
    /// [`Jump`](super::Jump)
    pub const JUMP: WireId = WireId(5);
    /// [`Inventory`](super::Inventory)
    pub const INVENTORY: WireId = WireId(6);
    /// [`Item`](super::Item)
    pub const ITEM: WireId = WireId(7);
    /// [`Player`](super::Player)
    pub const PLAYER: WireId = WireId(8);
    /// [`EntityState`](super::EntityState)
    pub const ENTITY_STATE: WireId = WireId(9);
}

// =============================================================================
// Raw components
// =============================================================================

/// Position, last position and scale in world units.
///
/// Size: 24 bytes
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Transform {
    /// Current position.
    pub position: [f32; 2],
    /// Position at the end of the previous tick.
    pub previous_position: [f32; 2],
    /// Render and collision scale.
    pub scale: [f32; 2],
}

impl Transform {
    /// Transform at a position with unit scale.
    #[must_use]
    pub const fn at(x: f32, y: f32) -> Self {
        Self {
            position: [x, y],
            previous_position: [x, y],
            scale: [1.0, 1.0],
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::at(0.0, 0.0)
    }
}

/// Constant downward acceleration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Gravity {
    /// Acceleration in units per second squared.
    pub force: f32,
}

/// Jump impulse and state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Jump {
    /// Vertical velocity applied on jump (negative is up).
    pub force: f32,
    /// Non-zero while airborne from a jump.
    pub is_jumping: u8,
    /// Padding for alignment.
    pub _padding: [u8; 3],
}

/// Marks an entity controlled by a player.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Player {
    /// Raw peer id of the controlling player.
    pub peer_id: u32,
}

/// Coarse lifecycle flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct EntityState {
    /// Non-zero while the entity takes part in simulation.
    pub is_active: u8,
    /// Non-zero while standing on something.
    pub is_grounded: u8,
    /// Padding for alignment.
    pub _padding: [u8; 2],
}

// =============================================================================
// Custom components
// =============================================================================

/// Axis-aligned collision box, derived from a rigidbody's base size.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Hitbox {
    /// Width and height.
    pub size: [f32; 2],
}

/// Physics body.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rigidbody {
    /// Velocity in units per second.
    pub velocity: [f32; 2],
    /// Mass.
    pub mass: f32,
    /// Collision box; local only.
    pub hitbox: Hitbox,
    /// Whether collisions are resolved for this body.
    pub can_collide: bool,
    /// Unscaled hitbox dimensions.
    pub base_size: [f32; 2],
}

impl Rigidbody {
    /// Rebuilds the hitbox from the base size and a transform scale.
    pub fn rebuild_hitbox(&mut self, scale: [f32; 2]) {
        self.hitbox.size = [self.base_size[0] * scale[0], self.base_size[1] * scale[1]];
    }
}

/// Renderer texture handle; meaningless on another machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Drawable sprite.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sprite {
    /// Asset path; the receiver resolves it through its own loader.
    pub texture_name: String,
    /// Loaded texture; local only.
    pub texture: Option<TextureHandle>,
}

/// Carried items and coins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Inventory {
    /// Coin count.
    pub coins: i32,
    /// Held item entities; local only.
    pub items: Vec<Entity>,
    /// Selected hotbar slot.
    pub selected_slot: i32,
    /// Capacity.
    pub max_items: i32,
}

/// UI widget handle; meaningless on another machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ViewHandle(pub u32);

/// Pickup in the world or in an inventory.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Item {
    /// Inventory icon; local only.
    pub ui_view: Option<ViewHandle>,
    /// Whether a player holds it.
    pub is_picked_up: bool,
    /// Seconds until it can be picked up; negative means never.
    pub time_until_pickup: f32,
    /// Seconds until it despawns; negative means never.
    pub time_until_despawn: f32,
    /// Coins go to the coin counter instead of a slot.
    pub is_coin: bool,
}

/// Layout: `velocity: [f32; 2], mass: f32, base_size: [f32; 2], can_collide: u8`.
fn encode_rigidbody(body: &Rigidbody) -> Vec<u8> {
    let mut writer = MessageWriter::with_capacity(21);
    writer.write_f32(body.velocity[0]);
    writer.write_f32(body.velocity[1]);
    writer.write_f32(body.mass);
    writer.write_f32(body.base_size[0]);
    writer.write_f32(body.base_size[1]);
    writer.write_bool(body.can_collide);
    writer.into_bytes()
}

fn decode_rigidbody(bytes: &[u8]) -> Rigidbody {
    let mut reader = MessageReader::new(bytes);
    let mut body = Rigidbody {
        velocity: [read_f32(&mut reader), read_f32(&mut reader)],
        mass: read_f32(&mut reader),
        ..Rigidbody::default()
    };
    body.base_size = [read_f32(&mut reader), read_f32(&mut reader)];
    body.can_collide = reader.read_bool().unwrap_or_default();
    body.rebuild_hitbox([1.0, 1.0]);
    body
}

/// Layout: `name_len: u16, name bytes`.
fn encode_sprite(sprite: &Sprite) -> Vec<u8> {
    let mut writer = MessageWriter::with_capacity(2 + sprite.texture_name.len());
    // Names past u16::MAX bytes are not valid asset paths; send them empty
    if writer.write_len_prefixed(sprite.texture_name.as_bytes()).is_err() {
        writer.write_u16(0);
    }
    writer.into_bytes()
}

fn decode_sprite(bytes: &[u8]) -> Sprite {
    let texture_name = MessageReader::new(bytes)
        .read_len_prefixed()
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .unwrap_or_default();
    Sprite {
        texture_name,
        texture: None,
    }
}

/// Layout: `coins: i32, selected_slot: i32, max_items: i32`.
fn encode_inventory(inventory: &Inventory) -> Vec<u8> {
    let mut writer = MessageWriter::with_capacity(12);
    writer.write_i32(inventory.coins);
    writer.write_i32(inventory.selected_slot);
    writer.write_i32(inventory.max_items);
    writer.into_bytes()
}

fn decode_inventory(bytes: &[u8]) -> Inventory {
    let mut reader = MessageReader::new(bytes);
    Inventory {
        coins: reader.read_i32().unwrap_or_default(),
        items: Vec::new(),
        selected_slot: reader.read_i32().unwrap_or_default(),
        max_items: reader.read_i32().unwrap_or_default(),
    }
}

/// Layout: `is_picked_up: u8, time_until_pickup: f32, time_until_despawn: f32, is_coin: u8`.
fn encode_item(item: &Item) -> Vec<u8> {
    let mut writer = MessageWriter::with_capacity(10);
    writer.write_bool(item.is_picked_up);
    writer.write_f32(item.time_until_pickup);
    writer.write_f32(item.time_until_despawn);
    writer.write_bool(item.is_coin);
    writer.into_bytes()
}

fn decode_item(bytes: &[u8]) -> Item {
    let mut reader = MessageReader::new(bytes);
    Item {
        ui_view: None,
        is_picked_up: reader.read_bool().unwrap_or_default(),
        time_until_pickup: read_f32(&mut reader),
        time_until_despawn: read_f32(&mut reader),
        is_coin: reader.read_bool().unwrap_or_default(),
    }
}

fn read_f32(reader: &mut MessageReader<'_>) -> f32 {
    reader.read_f32().unwrap_or_default()
}

/// Builds a codec with every standard component registered.
///
/// # Errors
///
/// Never fails on a fresh codec; the `Result` covers duplicate ids.
pub fn standard_codec() -> CodecResult<ComponentCodec> {
    let mut codec = ComponentCodec::new();
    register_standard_codecs(&mut codec)?;
    Ok(codec)
}

/// Adds the standard components to an existing codec.
///
/// # Errors
///
/// Returns an error if a standard type or wire id is already registered.
pub fn register_standard_codecs(codec: &mut ComponentCodec) -> CodecResult<()> {
    codec.register_raw::<Transform>(wire::TRANSFORM)?;
    codec.register_custom::<Rigidbody>(wire::RIGIDBODY, encode_rigidbody, decode_rigidbody)?;
    codec.register_custom::<Sprite>(wire::SPRITE, encode_sprite, decode_sprite)?;
    codec.register_raw::<Gravity>(wire::GRAVITY)?;
    codec.register_raw::<Jump>(wire::JUMP)?;
    codec.register_custom::<Inventory>(wire::INVENTORY, encode_inventory, decode_inventory)?;
    codec.register_custom::<Item>(wire::ITEM, encode_item, decode_item)?;
    codec.register_raw::<Player>(wire::PLAYER)?;
    codec.register_raw::<EntityState>(wire::ENTITY_STATE)?;
    Ok(())
}

/// Wire id of every standard component, ascending.
#[must_use]
pub const fn standard_wire_ids() -> [WireId; 9] {
    [
        wire::TRANSFORM,
        wire::RIGIDBODY,
        wire::SPRITE,
        wire::GRAVITY,
        wire::JUMP,
        wire::INVENTORY,
        wire::ITEM,
        wire::PLAYER,
        wire::ENTITY_STATE,
    ]
}

/// Registers the standard components with a world.
///
/// # Errors
///
/// Returns the world's error, e.g. when signature bits run out.
pub fn register_standard_components(world: &mut World) -> CodecResult<()> {
    standard_codec()?.register_components(world)
}
