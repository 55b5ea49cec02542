//! # Meridian Simulation
//!
//! Discrete-event simulation of geographic forwarding with an anchor
//! location directory.
//!
//! ## Overview
//!
//! A [`World`] hosts a set of nodes, each running a
//! [`GeoRouter`](meridian_routing::GeoRouter). The world stands in for
//! everything a router would get from a real platform:
//!
//! - **Time**: a single event queue drives every timer and frame
//! - **Radio**: unit-disk propagation with a fixed range and link delay
//! - **Mobility**: each node follows a [`Mobility`] model
//! - **Ground truth**: true positions, used only to measure location error
//!
//! Routing events from every node are folded into [`SimStats`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use meridian_simulation::*;
//!
//! let mut world = World::new(SimConfig::default());
//! world.add_anchor(NodeId::host(1), Position::new(500.0, 0.0));
//! world.add_mobile(NodeId::host(2), Mobility::fixed(0.0, 0.0));
//! world.add_mobile(NodeId::host(3), Mobility::fixed(200.0, 0.0));
//! world.add_mobile(NodeId::host(4), Mobility::fixed(400.0, 0.0));
//!
//! world.send_at(Duration::from_secs(3), NodeId::host(2), NodeId::host(1), &b"hi"[..]);
//! world.run();
//!
//! assert_eq!(world.stats().packets_delivered, 1);
//! ```

pub mod config;
pub mod mobility;
pub mod scenarios;
pub mod stats;
pub mod world;

pub use config::{ConfigError, SimConfig};
pub use mobility::{Kinematics, Mobility};
pub use scenarios::HighwayParams;
pub use stats::{DropCounts, SimStats};
pub use world::{EventQueue, LoggedEvent, SimNode, World, WorldEvent};

// Re-export core types used to describe scenarios
pub use meridian_core::{NodeId, Position, Velocity};
