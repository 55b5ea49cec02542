//! Collaborator traits
//!
//! The routing core never touches sockets, clocks or mobility directly.
//! Everything it needs from the outside world is expressed here, so the
//! same node logic runs inside the discrete-event simulation and in tests
//! with hand-driven doubles.
//!
//! ## Key Traits
//!
//! - [`Scheduler`]: virtual time, deferred timers and cancellation
//! - [`Transport`]: one-hop delivery of encoded frames
//! - [`PositionSource`]: the node's own position and velocity
//! - [`Registry`]: this node's identity, role and the anchor list
//! - [`Oracle`]: ground truth, for accuracy logging only
//!
//! Inbound frames are pushed into the router by whoever owns the transport
//! (`GeoRouter::on_receive`), which is the receive callback.

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::geometry::{Position, Velocity};
use crate::identity::{NodeId, Role};

/// Time abstraction
///
/// Time is a duration since the start of the run, so tests and the
/// simulation control it completely.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Work a node asks to be woken up for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timer {
    /// Periodic forwarding-layer hello
    Hello,
    /// Deferred queue re-check
    QueueRecheck,
}

/// Handle to a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerToken(pub u64);

/// Discrete-event scheduler
///
/// Callbacks run to completion; a node that needs to react later registers
/// a [`Timer`] and returns. Cancelling a token that already fired is a
/// no-op.
pub trait Scheduler: Clock {
    fn schedule(&mut self, delay: Duration, timer: Timer) -> TimerToken;

    fn cancel(&mut self, token: TimerToken);
}

/// One-hop frame delivery
///
/// `destination` is the link-level next hop, or [`NodeId::BROADCAST`].
/// An error means the frame did not leave; a frame that left may still be
/// lost.
pub trait Transport {
    fn send(&mut self, payload: Bytes, destination: NodeId, port: u16) -> Result<(), TransportError>;
}

/// The node's own kinematics
pub trait PositionSource {
    fn current_position(&self) -> Position;

    fn current_velocity(&self) -> Velocity;
}

/// A fixed infrastructure node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorInfo {
    pub id: NodeId,
    pub position: Position,
}

/// Identity and role of this node, plus the anchors it may talk to
pub trait Registry {
    fn local_id(&self) -> NodeId;

    fn role(&self) -> Role;

    /// All anchors of the deployment (may include this node)
    fn anchors(&self) -> Vec<AnchorInfo>;
}

/// Ground truth, used exclusively to log prediction accuracy
pub trait Oracle {
    fn true_position(&self, id: NodeId) -> Option<Position>;
}
