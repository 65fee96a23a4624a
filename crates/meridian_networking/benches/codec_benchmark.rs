//! # Codec Performance Benchmark
//!
//! Measures the replication hot paths:
//! - raw and custom component encode/decode
//! - full-entity init encoding
//! - message framing and parsing of a batch update
//!
//! Run with: `cargo bench --package meridian_networking`

// Benchmarks don't need docs and may have intentionally unused code
#![allow(missing_docs)]
#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use meridian_core::World;
use meridian_networking::components::{self, Rigidbody, Sprite, Transform};
use meridian_networking::{ComponentFrame, Message, NetworkId};

fn bench_component_codecs(c: &mut Criterion) {
    let codec = components::standard_codec().expect("standard codec");
    let transform = Transform::at(12.5, -3.0);
    let body = Rigidbody {
        velocity: [3.0, -9.8],
        mass: 70.0,
        can_collide: true,
        base_size: [0.8, 1.8],
        ..Rigidbody::default()
    };
    let sprite = Sprite {
        texture_name: "textures/player_idle.png".into(),
        texture: None,
    };

    let mut group = c.benchmark_group("component_codec");

    group.bench_function("transform_raw_round_trip", |b| {
        b.iter(|| {
            let bytes = codec.encode(black_box(&transform)).expect("encode");
            black_box(codec.decode::<Transform>(&bytes).expect("decode"))
        });
    });

    group.bench_function("rigidbody_custom_round_trip", |b| {
        b.iter(|| {
            let bytes = codec.encode(black_box(&body)).expect("encode");
            black_box(codec.decode::<Rigidbody>(&bytes).expect("decode"))
        });
    });

    group.bench_function("sprite_custom_round_trip", |b| {
        b.iter(|| {
            let bytes = codec.encode(black_box(&sprite)).expect("encode");
            black_box(codec.decode::<Sprite>(&bytes).expect("decode"))
        });
    });

    group.finish();
}

fn bench_entity_init(c: &mut Criterion) {
    let codec = components::standard_codec().expect("standard codec");
    let mut world = World::new(16);
    codec.register_components(&mut world).expect("register");

    let entity = world.create_entity().expect("entity");
    world.add_component(entity, Transform::at(1.0, 2.0)).expect("add");
    world
        .add_component(
            entity,
            Rigidbody {
                mass: 1.0,
                base_size: [1.0, 1.0],
                ..Rigidbody::default()
            },
        )
        .expect("add");
    world
        .add_component(
            entity,
            Sprite {
                texture_name: "textures/crate.png".into(),
                texture: None,
            },
        )
        .expect("add");

    c.bench_function("encode_attached_and_frame_init", |b| {
        b.iter(|| {
            let frames = codec.encode_attached(&world, black_box(entity)).expect("frames");
            let message = Message::EntityInit {
                network_id: NetworkId(1),
                frames,
            };
            black_box(message.encode(0).expect("encode"))
        });
    });
}

fn bench_batch_parse(c: &mut Criterion) {
    let frames: Vec<ComponentFrame> = (1..=8)
        .map(|wire| ComponentFrame {
            wire_id: meridian_networking::WireId(wire),
            bytes: vec![wire; 24],
        })
        .collect();
    let bytes = Message::ComponentBatchUpdate {
        network_id: NetworkId(42),
        frames,
    }
    .encode(7)
    .expect("encode");

    c.bench_function("decode_batch_update_8_frames", |b| {
        b.iter(|| black_box(Message::decode(black_box(&bytes)).expect("decode")));
    });
}

criterion_group!(
    benches,
    bench_component_codecs,
    bench_entity_init,
    bench_batch_parse
);
criterion_main!(benches);
