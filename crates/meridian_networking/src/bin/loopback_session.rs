//! # Loopback Session
//!
//! Runs a host and two clients in one process over the loopback transport:
//! 1. Clients join and receive peer ids
//! 2. The host spawns a crate; each client requests an id and spawns a player
//! 3. Players move for a few ticks; only changed components are sent
//! 4. Client 1 hands its player to client 2
//!
//! An optional argument names a TOML session config.

use meridian_core::{EcsResult, Entity, World};
use meridian_networking::components::{self, wire, EntityState, Player, Sprite, Transform};
use meridian_networking::{
    LoopbackNetwork, LoopbackTransport, NetworkId, ReplicationSystem, SessionConfig,
};
use std::error::Error;

struct Peer {
    name: &'static str,
    world: World,
    replication: ReplicationSystem<LoopbackTransport>,
}

impl Peer {
    fn new(
        name: &'static str,
        transport: LoopbackTransport,
        config: &SessionConfig,
    ) -> Result<Self, Box<dyn Error>> {
        let mut world = World::with_config(&config.world);
        let replication = ReplicationSystem::new(
            &mut world,
            transport,
            components::standard_codec()?,
            config.replication.clone(),
        )?;
        Ok(Self {
            name,
            world,
            replication,
        })
    }

    fn poll(&mut self) -> usize {
        self.replication.poll(&mut self.world)
    }

    fn position(&self, id: NetworkId) -> Option<[f32; 2]> {
        let entity = self.replication.entity(id)?;
        let transform = self.world.get_component::<Transform>(entity).ok()?;
        Some(transform.position)
    }
}

fn settle(peers: &mut [&mut Peer]) -> usize {
    let mut rounds = 0;
    while rounds < 64 {
        let handled: usize = peers.iter_mut().map(|peer| peer.poll()).sum();
        if handled == 0 {
            break;
        }
        rounds += 1;
    }
    rounds
}

fn build_player(peer_id: u32, x: f32) -> impl FnOnce(&mut World, Entity) -> EcsResult<()> {
    move |world, entity| {
        world.add_component(entity, Transform::at(x, 0.0))?;
        world.add_component(entity, Player { peer_id })?;
        world.add_component(
            entity,
            EntityState {
                is_active: 1,
                ..EntityState::default()
            },
        )?;
        world.add_component(
            entity,
            Sprite {
                texture_name: "textures/player.png".into(),
                texture: None,
            },
        )
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║              MERIDIAN LOOPBACK SESSION                           ║");
    println!("║              1 host, 2 clients, in-process transport             ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");

    let (network, host_transport) = LoopbackNetwork::new();
    let mut host = Peer::new("host", host_transport, &config)?;
    let mut alice = Peer::new("client 1", network.connect(), &config)?;
    let mut bob = Peer::new("client 2", network.connect(), &config)?;
    settle(&mut [&mut host, &mut alice, &mut bob]);

    for peer in [&alice, &bob] {
        println!("  {} joined as {:?}", peer.name, peer.replication.local_peer());
    }

    // Host-owned scenery
    let crate_id = host.replication.allocate_network_id()?;
    host.replication.spawn_owned(
        &mut host.world,
        crate_id,
        vec![wire::TRANSFORM],
        |world, entity| world.add_component(entity, Transform::at(-5.0, 0.0)),
    )?;

    // Each client claims an id and spawns its player
    let mut players = Vec::new();
    for (index, x) in [(0_usize, 1.0_f32), (1, 2.0)] {
        let client = if index == 0 { &mut alice } else { &mut bob };
        client.replication.request_network_id()?;
        settle(&mut [&mut host, &mut alice, &mut bob]);

        let client = if index == 0 { &mut alice } else { &mut bob };
        let id = client
            .replication
            .take_pending_grant()
            .ok_or("no network id granted")?;
        let peer_id = client.replication.local_peer().map_or(0, |peer| peer.0);
        client.replication.spawn_owned(
            &mut client.world,
            id,
            vec![wire::TRANSFORM, wire::ENTITY_STATE],
            build_player(peer_id, x),
        )?;
        println!("  {} spawned player {}", client.name, id);
        players.push(id);
        settle(&mut [&mut host, &mut alice, &mut bob]);
    }

    // Move the first player for a few ticks
    let alice_player = players[0];
    for tick in 0..5_u8 {
        if let Some(entity) = alice.replication.entity(alice_player) {
            let transform = alice.world.get_component_mut::<Transform>(entity)?;
            transform.previous_position = transform.position;
            transform.position[0] += 0.5;
        }
        let sent = alice.replication.broadcast_changes(&alice.world)?;
        settle(&mut [&mut host, &mut alice, &mut bob]);
        println!(
            "  tick {}: sent {} update(s), client 2 sees {:?}",
            tick,
            sent,
            bob.position(alice_player)
        );
    }

    // An idle tick sends nothing
    let idle = alice.replication.broadcast_changes(&alice.world)?;
    println!("  idle tick: sent {} update(s)", idle);

    // Hand the first player to client 2
    let bob_peer = bob.replication.local_peer().ok_or("client 2 has not joined")?;
    alice
        .replication
        .transfer_ownership(&mut alice.world, alice_player, bob_peer)?;
    settle(&mut [&mut host, &mut alice, &mut bob]);

    println!();
    println!("Ownership of {}:", alice_player);
    for peer in [&host, &alice, &bob] {
        println!(
            "  {:<9} owns: {:<5} position: {:?}",
            peer.name,
            peer.replication.owns(&peer.world, alice_player),
            peer.position(alice_player)
        );
    }
    println!("Crate {} seen by client 2 at {:?}", crate_id, bob.position(crate_id));

    println!();
    for peer in [&host, &alice, &bob] {
        let stats = peer.replication.stats();
        println!(
            "  {:<9} sent {:>3}  received {:>3}  relayed {:>3}  dropped {}",
            peer.name,
            stats.messages_sent,
            stats.messages_received,
            stats.messages_relayed,
            stats.messages_dropped
        );
    }
    Ok(())
}
