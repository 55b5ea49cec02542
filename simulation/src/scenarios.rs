//! Pre-defined simulation scenarios
//!
//! Each `build_*` function returns a configured [`World`] with its traffic
//! scheduled; the matching `run_*` function runs it and prints a summary.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use meridian_core::{NodeId, Position};

use crate::config::SimConfig;
use crate::mobility::Mobility;
use crate::world::World;

/// First traffic leaves once hellos and registrations have settled
pub const TRAFFIC_START: Duration = Duration::from_secs(3);

/// Schedule `count` packets from `from` to `to`, one per traffic interval
pub fn schedule_flow(world: &mut World, from: NodeId, to: NodeId, start: Duration, count: u32) {
    let interval = world.config().traffic_interval;
    for i in 0..count {
        let payload = format!("{from}->{to} #{i}");
        world.send_at(start + interval * i, from, to, payload.into_bytes());
    }
}

/// A chain of mobiles 200 m apart ending at an anchor
///
/// ```text
/// M1 -- M2 -- M3 -- M4 -- M5 -- A6
/// ```
///
/// Every hop makes progress toward the anchor, so traffic is delivered
/// without ever entering recovery.
pub fn build_greedy_line(config: SimConfig) -> World {
    let mut world = World::new(config);
    for n in 1..=5u32 {
        world.add_mobile(NodeId::host(n), Mobility::fixed(f64::from(n - 1) * 200.0, 0.0));
    }
    world.add_anchor(NodeId::host(6), Position::new(1000.0, 0.0));
    schedule_flow(&mut world, NodeId::host(1), NodeId::host(6), TRAFFIC_START, 5);
    world
}

/// A source whose only neighbor is farther from the destination
///
/// ```text
///            B3 ---- C4
///          /            \
///        A2              E5
///        |                 \
///        S1                 D6 (anchor)
/// ```
///
/// S1 has no neighbor closer to D6, so packets go around the void on the
/// right-hand rule until E5 can forward greedily again.
pub fn build_void(config: SimConfig) -> World {
    let scale = config.radio_range / 150.0;
    let at = |x: f64, y: f64| Position::new(x * scale, y * scale);

    let mut world = World::new(config);
    world.add_mobile(NodeId::host(1), Mobility::Static { position: at(100.0, 300.0) });
    world.add_mobile(NodeId::host(2), Mobility::Static { position: at(100.0, 420.0) });
    world.add_mobile(NodeId::host(3), Mobility::Static { position: at(200.0, 500.0) });
    world.add_mobile(NodeId::host(4), Mobility::Static { position: at(330.0, 500.0) });
    world.add_mobile(NodeId::host(5), Mobility::Static { position: at(450.0, 420.0) });
    world.add_anchor(NodeId::host(6), at(500.0, 300.0));
    schedule_flow(&mut world, NodeId::host(1), NodeId::host(6), TRAFFIC_START, 5);
    world
}

/// Two anchors at either end of a row of mobiles
///
/// ```text
///   M10  M11  M12  M13  M14  M15
///   A1                       A2
/// ```
///
/// M10 registers with A1 and M15 with A2. M10 does not know where M15 is:
/// its query misses at A1, which looks M15 up at A2 before replying.
pub fn build_directory_lookup(config: SimConfig) -> World {
    let mut world = World::new(config);
    world.add_anchor(NodeId::host(1), Position::new(300.0, 300.0));
    world.add_anchor(NodeId::host(2), Position::new(1300.0, 300.0));
    for (i, n) in (10..=15u32).enumerate() {
        world.add_mobile(NodeId::host(n), Mobility::fixed(300.0 + 200.0 * i as f64, 420.0));
    }
    schedule_flow(&mut world, NodeId::host(10), NodeId::host(15), TRAFFIC_START, 3);
    world
}

/// Parameters of the highway scenario
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighwayParams {
    /// Ring road length, metres
    pub length: f64,
    pub vehicles: u32,
    pub anchors: u32,
    /// Random source/destination pairs
    pub flows: u32,
    pub min_speed: f64,
    pub max_speed: f64,
}

impl Default for HighwayParams {
    fn default() -> Self {
        Self {
            length: 3000.0,
            vehicles: 20,
            anchors: 3,
            flows: 5,
            min_speed: 20.0,
            max_speed: 35.0,
        }
    }
}

/// Anchor ids in the highway scenario start at 1
pub fn highway_anchor(n: u32) -> NodeId {
    NodeId::host(1 + n)
}

/// Vehicle ids in the highway scenario start at 100
pub fn highway_vehicle(n: u32) -> NodeId {
    NodeId::host(100 + n)
}

/// Vehicles on a two-lane ring road with roadside anchors
///
/// Lane 0 drives east, lane 1 west. Placement, speeds and flows are drawn
/// from the configured seed.
pub fn build_highway(config: SimConfig, params: HighwayParams) -> World {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let duration = config.duration;
    let mut world = World::new(config);

    for n in 0..params.anchors {
        let x = params.length * (f64::from(n) + 0.5) / f64::from(params.anchors);
        world.add_anchor(highway_anchor(n), Position::new(x, 0.0));
    }

    for n in 0..params.vehicles {
        let lane = rng.random_range(0..2u32);
        let x = rng.random_range(0.0..params.length);
        let speed = if params.max_speed > params.min_speed {
            rng.random_range(params.min_speed..params.max_speed)
        } else {
            params.min_speed
        };
        let (y, speed) = if lane == 0 { (20.0, speed) } else { (40.0, -speed) };
        world.add_mobile(
            highway_vehicle(n),
            Mobility::highway(Position::new(x, y), speed, params.length),
        );
    }

    if params.vehicles >= 2 {
        let interval = world.config().traffic_interval.max(Duration::from_millis(1));
        let remaining = duration.saturating_sub(TRAFFIC_START);
        let count = (remaining.as_secs_f64() / interval.as_secs_f64()) as u32;
        for _ in 0..params.flows {
            let from = rng.random_range(0..params.vehicles);
            let mut to = rng.random_range(0..params.vehicles - 1);
            if to >= from {
                to += 1;
            }
            schedule_flow(
                &mut world,
                highway_vehicle(from),
                highway_vehicle(to),
                TRAFFIC_START,
                count.saturating_sub(1),
            );
        }
    }

    world
}

fn report(name: &str, world: &World) {
    println!("\n=== {} ===", name);
    println!("  Simulated time:      {:.1}s", world.now().as_secs_f64());
    println!("  Nodes:               {}", world.node_ids().len());
    println!("  Frames on air:       {}", world.frames_sent());
    print!("{}", world.stats());
}

fn run(name: &str, mut world: World) -> World {
    info!(scenario = name, "Running scenario");
    world.run();
    report(name, &world);
    world
}

pub fn run_greedy_line(config: SimConfig) -> World {
    run("Greedy line", build_greedy_line(config))
}

pub fn run_void(config: SimConfig) -> World {
    run("Void recovery", build_void(config))
}

pub fn run_directory_lookup(config: SimConfig) -> World {
    run("Directory lookup", build_directory_lookup(config))
}

pub fn run_highway(config: SimConfig, params: HighwayParams) -> World {
    run("Highway", build_highway(config, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highway_placement_is_seeded() {
        let params = HighwayParams::default();
        let config = SimConfig::default().with_duration(Duration::from_secs(5));
        let mut a = build_highway(config.clone(), params);
        let mut b = build_highway(config, params);
        a.start();
        b.start();

        let ids = a.node_ids();
        assert_eq!(ids.len(), (params.vehicles + params.anchors) as usize);
        for id in ids {
            assert_eq!(a.position_of(id), b.position_of(id));
        }
    }

    #[test]
    fn test_void_scales_with_radio_range() {
        let mut config = SimConfig::default();
        config.radio_range = 150.0;
        let mut world = build_void(config);
        world.start();
        assert_eq!(world.position_of(NodeId::host(1)), Some(Position::new(100.0, 300.0)));
        assert_eq!(world.position_of(NodeId::host(6)), Some(Position::new(500.0, 300.0)));
    }
}
