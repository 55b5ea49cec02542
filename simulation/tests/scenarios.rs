//! End-to-end runs of the built-in scenarios

use std::time::Duration;

use meridian_core::{ForwardMode, RoutingEvent};
use meridian_simulation::scenarios::{
    build_directory_lookup, build_greedy_line, build_highway, build_void, highway_vehicle,
};
use meridian_simulation::{HighwayParams, NodeId, SimConfig};

fn short_run() -> SimConfig {
    SimConfig::default().with_duration(Duration::from_secs(12))
}

#[test]
fn test_greedy_line_never_enters_recovery() {
    let mut world = build_greedy_line(short_run());
    world.run();

    let stats = world.stats();
    assert_eq!(stats.packets_sent, 5);
    assert_eq!(stats.packets_delivered, 5);
    assert_eq!(stats.mean_hops(), Some(5.0));
    assert_eq!(stats.recovery_hops, 0);
    assert_eq!(stats.drops.total(), 0);
}

#[test]
fn test_void_is_traversed_in_recovery() {
    let mut world = build_void(short_run());
    world.run();

    let stats = world.stats();
    assert_eq!(stats.packets_sent, 5);
    assert_eq!(stats.packets_delivered, 5);
    assert!(stats.recovery_hops >= 10, "{stats}");

    // The source has no greedy choice
    let source = NodeId::host(1);
    assert!(world.events().iter().any(|e| e.node == source
        && matches!(
            e.event,
            RoutingEvent::Forwarded {
                mode: ForwardMode::Recovery,
                ..
            }
        )));
    assert!(!world.events().iter().any(|e| e.node == source
        && matches!(
            e.event,
            RoutingEvent::Forwarded {
                mode: ForwardMode::Greedy,
                ..
            }
        )));
}

#[test]
fn test_directory_lookup_resolves_across_anchors() {
    let mut world = build_directory_lookup(short_run());
    world.run();

    let stats = world.stats();
    assert!(stats.queries_issued >= 1);
    assert!(stats.locations_resolved >= 1);
    assert_eq!(stats.searches_timed_out, 0);
    assert_eq!(stats.packets_sent, 3);
    assert_eq!(stats.packets_delivered, 3);
    assert!(stats.packets_deferred >= 1);

    // The first anchor missed and asked the second
    let first_anchor = NodeId::host(1);
    assert!(world.events().iter().any(|e| e.node == first_anchor
        && matches!(e.event, RoutingEvent::QueryIssued { target, .. } if target == NodeId::host(15))));

    // The lookup was measured against ground truth
    assert_eq!(stats.mean_location_error(), Some(0.0));
}

#[test]
fn test_highway_runs_to_completion() {
    let params = HighwayParams {
        flows: 4,
        ..Default::default()
    };
    let config = SimConfig::default().with_duration(Duration::from_secs(15));
    let mut world = build_highway(config, params);
    world.run();

    let stats = world.stats();
    assert_eq!(world.now(), Duration::from_secs(15));
    // One packet per second from 3s, the last one a second before the end
    assert_eq!(stats.packets_sent, 4 * 11);
    assert!(stats.packets_delivered <= stats.packets_sent);
    assert!(stats.greedy_hops + stats.direct_hops > 0);
    assert!((0.0..=1.0).contains(&stats.delivery_ratio()));
    assert!(world.router(highway_vehicle(0)).is_some());
    assert_eq!(stats.drops.malformed, 0);
}

#[test]
fn test_jammed_highway_delivers_without_loops() {
    // Stationary traffic dense enough that every gap is inside radio range
    let params = HighwayParams {
        length: 1500.0,
        vehicles: 60,
        anchors: 3,
        flows: 6,
        min_speed: 0.0,
        max_speed: 0.0,
    };
    let config = SimConfig::default().with_duration(Duration::from_secs(15));
    let mut world = build_highway(config, params);
    world.run();

    let stats = world.stats();
    assert_eq!(stats.packets_sent, 6 * 11);
    assert!(stats.delivery_ratio() >= 0.75, "{stats}");
    assert_eq!(stats.drops.ttl_expired, 0, "{stats}");
    assert_eq!(stats.drops.malformed, 0);
    assert!(stats.queries_issued >= 1, "{stats}");
    assert!(stats.locations_resolved >= 1, "{stats}");
}
