//! # Meridian Core
//!
//! Core types, wire formats, collaborator traits and errors for the
//! Meridian geographic routing stack.
//!
//! The forwarding engine and the location directory are written against
//! the traits in this crate, so the same node logic runs inside the
//! discrete-event simulation and under hand-driven test doubles.
//!
//! ## Key Traits
//!
//! - [`Scheduler`]: virtual time and one-shot timers
//! - [`Transport`]: one-hop frame delivery
//! - [`PositionSource`]: the node's own kinematics
//! - [`Registry`]: node identity, role and anchor list
//! - [`Oracle`]: ground truth for accuracy logging
//!
//! ## Key Types
//!
//! - [`NodeId`]: IPv4-style node address
//! - [`Position`] / [`Velocity`]: planar kinematics
//! - [`Message`]: every message that can appear on the wire
//! - [`Datagram`]: a routed packet with its end-to-end header
//! - [`RoutingEvent`]: what a node did with a packet or query

pub mod datagram;
pub mod error;
pub mod event;
pub mod geometry;
pub mod identity;
pub mod mock;
pub mod routing;
pub mod traits;
pub mod wire;

// Re-export main types
pub use datagram::*;
pub use error::*;
pub use event::*;
pub use geometry::*;
pub use identity::*;
pub use routing::*;
pub use traits::*;
pub use wire::*;
