//! # World Property Tests
//!
//! Random add/remove/destroy sequences, driven by a seeded RNG, checked
//! against a plain model after every step:
//!
//! - `has_component` agrees with the signature bit
//! - every stored component is still readable after swap-compaction
//! - a system's matched set equals the set of live entities covering it

use meridian_core::{Entity, Signature, System, World};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position(u32);

#[derive(Debug, Clone, Copy, PartialEq)]
struct Velocity(u32);

struct Movement;

impl System for Movement {
    fn update(&mut self, _world: &mut World, _dt: f32) {}
}

#[derive(Default)]
struct Model {
    positions: BTreeMap<Entity, Position>,
    velocities: BTreeMap<Entity, Velocity>,
    alive: BTreeSet<Entity>,
}

fn setup(capacity: usize) -> World {
    let mut world = World::new(capacity);
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
    world
}

fn check(world: &World, model: &Model) {
    let position = world.component_type::<Position>().unwrap();
    let velocity = world.component_type::<Velocity>().unwrap();

    assert_eq!(world.alive_count(), model.alive.len());
    for &entity in &model.alive {
        let signature = world.signature(entity).unwrap();
        assert_eq!(world.has_component::<Position>(entity), signature.has(position));
        assert_eq!(world.has_component::<Velocity>(entity), signature.has(velocity));

        assert_eq!(
            world.get_component::<Position>(entity).ok(),
            model.positions.get(&entity)
        );
        assert_eq!(
            world.get_component::<Velocity>(entity).ok(),
            model.velocities.get(&entity)
        );
    }

    assert_eq!(world.storage::<Position>().unwrap().len(), model.positions.len());
    assert_eq!(world.storage::<Velocity>().unwrap().len(), model.velocities.len());

    let expected: BTreeSet<Entity> = model
        .alive
        .iter()
        .copied()
        .filter(|e| model.positions.contains_key(e) && model.velocities.contains_key(e))
        .collect();
    assert_eq!(world.system_entities::<Movement>().unwrap(), &expected);
}

fn run(seed: u64, steps: usize) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut world = setup(64);
    let mut model = Model::default();
    let mut next_value = 0u32;

    for _ in 0..steps {
        let roll = rng.gen_range(0..100);
        let alive: Vec<Entity> = model.alive.iter().copied().collect();

        if roll < 20 || alive.is_empty() {
            if let Ok(entity) = world.create_entity() {
                model.alive.insert(entity);
            } else {
                assert_eq!(model.alive.len(), 64);
            }
        } else {
            let entity = alive[rng.gen_range(0..alive.len())];
            next_value += 1;
            match roll {
                20..=44 => {
                    let value = Position(next_value);
                    let absent = !model.positions.contains_key(&entity);
                    assert_eq!(world.add_component(entity, value).is_ok(), absent);
                    model.positions.entry(entity).or_insert(value);
                }
                45..=69 => {
                    let value = Velocity(next_value);
                    world.set_component(entity, value).unwrap();
                    model.velocities.insert(entity, value);
                }
                70..=84 => {
                    let removed = world.remove_component::<Position>(entity).ok();
                    assert_eq!(removed, model.positions.remove(&entity));
                }
                _ => {
                    world.destroy_entity(entity).unwrap();
                    model.alive.remove(&entity);
                    model.positions.remove(&entity);
                    model.velocities.remove(&entity);
                }
            }
        }

        check(&world, &model);
    }
}

#[test]
fn test_random_sequences_match_model() {
    for seed in [1, 7, 42, 1337, 9001] {
        run(seed, 2_000);
    }
}

#[test]
fn test_destroyed_ids_return_in_fifo_order() {
    let mut world = setup(4);
    let entities: Vec<Entity> = (0..4).map(|_| world.create_entity().unwrap()).collect();
    assert!(world.create_entity().is_err());

    world.destroy_entity(entities[2]).unwrap();
    world.destroy_entity(entities[0]).unwrap();

    assert_eq!(world.create_entity().unwrap(), entities[2]);
    assert_eq!(world.create_entity().unwrap(), entities[0]);
}

#[test]
fn test_reused_id_starts_clean() {
    let mut world = setup(1);
    let entity = world.create_entity().unwrap();
    world.add_component(entity, Position(1)).unwrap();
    world.add_component(entity, Velocity(1)).unwrap();
    world.destroy_entity(entity).unwrap();

    let reused = world.create_entity().unwrap();
    assert_eq!(reused, entity);
    assert!(world.signature(reused).unwrap().is_empty());
    assert!(!world.has_component::<Position>(reused));
    assert!(world.system_entities::<Movement>().unwrap().is_empty());
}
