//! # ECS Performance Benchmark
//!
//! Measures the hot paths of the world facade:
//! - entity create/destroy churn through the FIFO free list
//! - component add/remove with swap-compaction and system notification
//! - dense iteration over a packed store
//!
//! Run with: `cargo bench --package meridian_core`

// Benchmarks don't need docs and may have intentionally unused code
#![allow(missing_docs)]
#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use meridian_core::{Signature, System, World};

/// Entity count used by every benchmark.
const ENTITY_COUNT: usize = 10_000;

#[derive(Clone, Copy, Default)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy, Default)]
struct Velocity {
    x: f32,
    y: f32,
}

struct Movement;

impl System for Movement {
    fn update(&mut self, world: &mut World, dt: f32) {
        let Ok(entities) = world.system_entities_snapshot::<Self>() else {
            return;
        };
        for entity in entities {
            let Ok(velocity) = world.get_component::<Velocity>(entity).copied() else {
                continue;
            };
            if let Ok(position) = world.get_component_mut::<Position>(entity) {
                position.x += velocity.x * dt;
                position.y += velocity.y * dt;
            }
        }
    }
}

fn populated_world(count: usize) -> World {
    let mut world = World::new(count);
    let position = world.register_component::<Position>().unwrap();
    let velocity = world.register_component::<Velocity>().unwrap();
    world.register_system::<Movement>().unwrap();
    world
        .set_system_signature::<Movement>(
            Signature::EMPTY
                .with(position.component_type())
                .with(velocity.component_type()),
        )
        .unwrap();

    for _ in 0..count {
        let entity = world.create_entity().unwrap();
        world.add_component(entity, Position::default()).unwrap();
        world
            .add_component(entity, Velocity { x: 1.0, y: 0.5 })
            .unwrap();
    }
    world
}

/// Benchmark: create and destroy every entity.
fn bench_entity_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_churn");

    for count in [1_000, ENTITY_COUNT] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut world = World::new(count);
            let mut entities = Vec::with_capacity(count);
            b.iter(|| {
                for _ in 0..count {
                    entities.push(world.create_entity().unwrap());
                }
                for entity in entities.drain(..) {
                    world.destroy_entity(black_box(entity)).unwrap();
                }
            });
        });
    }

    group.finish();
}

/// Benchmark: remove and re-add a component on every entity.
fn bench_component_churn(c: &mut Criterion) {
    c.bench_function("component_remove_add_10K", |b| {
        let mut world = populated_world(ENTITY_COUNT);
        let entities: Vec<_> = world.entities().collect();
        b.iter(|| {
            for &entity in &entities {
                let velocity = world.remove_component::<Velocity>(entity).unwrap();
                world.add_component(entity, black_box(velocity)).unwrap();
            }
        });
    });
}

/// Benchmark: one movement tick over matched entities.
fn bench_movement_tick(c: &mut Criterion) {
    c.bench_function("movement_tick_10K", |b| {
        let mut world = populated_world(ENTITY_COUNT);
        let mut movement = Movement;
        b.iter(|| movement.update(&mut world, black_box(1.0 / 60.0)));
    });
}

/// Benchmark: iterate the packed store directly.
fn bench_dense_iteration(c: &mut Criterion) {
    c.bench_function("dense_iteration_10K", |b| {
        let world = populated_world(ENTITY_COUNT);
        b.iter(|| {
            let storage = world.storage::<Position>().unwrap();
            let sum: f32 = storage.as_slice().iter().map(|p| p.x + p.y).sum();
            black_box(sum)
        });
    });
}

criterion_group!(
    benches,
    bench_entity_churn,
    bench_component_churn,
    bench_movement_tick,
    bench_dense_iteration,
);
criterion_main!(benches);
