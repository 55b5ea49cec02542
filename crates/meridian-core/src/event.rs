//! Routing events
//!
//! Nodes record what happened to each packet and query as a stream of
//! [`RoutingEvent`]s. The simulation folds them into statistics; nothing in
//! the routing decisions reads them back.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ForwardError;
use crate::identity::NodeId;

/// How a packet left a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForwardMode {
    /// The destination is a neighbor
    Direct,
    /// A neighbor strictly closer to the destination
    Greedy,
    /// Perimeter traversal (right-hand rule)
    Recovery,
}

impl fmt::Display for ForwardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Greedy => write!(f, "greedy"),
            Self::Recovery => write!(f, "recovery"),
        }
    }
}

/// Reasons a packet might be dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DropReason {
    /// Unknown or short message
    Malformed,
    /// No greedy progress and no recovery neighbor
    NoRoute,
    /// Destination position could not be resolved in time
    SearchTimeout,
    /// Deferred queue full
    QueueOverflow,
    /// Waited too long in the deferred queue
    QueueExpired,
    /// Hop limit reached
    TtlExpired,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "Malformed message"),
            Self::NoRoute => write!(f, "No route available"),
            Self::SearchTimeout => write!(f, "Location search timed out"),
            Self::QueueOverflow => write!(f, "Deferred queue overflow"),
            Self::QueueExpired => write!(f, "Buffered too long"),
            Self::TtlExpired => write!(f, "TTL expired"),
        }
    }
}

impl From<ForwardError> for DropReason {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::NoRoute => Self::NoRoute,
            ForwardError::SearchTimeout => Self::SearchTimeout,
            ForwardError::QueueOverflow => Self::QueueOverflow,
            ForwardError::QueueExpired => Self::QueueExpired,
            ForwardError::TtlExpired => Self::TtlExpired,
        }
    }
}

/// Something a node did with a packet or a location query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoutingEvent {
    /// A datagram was created at its source
    Originated {
        packet_id: u32,
        destination: NodeId,
        at: Duration,
    },

    /// A datagram was handed to the link layer
    Forwarded {
        packet_id: u32,
        next_hop: NodeId,
        mode: ForwardMode,
        at: Duration,
    },

    /// A datagram was buffered waiting for a destination position
    Deferred {
        packet_id: u32,
        destination: NodeId,
        at: Duration,
    },

    /// A data datagram reached its destination
    Delivered {
        packet_id: u32,
        source: NodeId,
        hops: u8,
        at: Duration,
    },

    /// A datagram or frame was dropped
    Dropped {
        packet_id: Option<u32>,
        reason: DropReason,
        at: Duration,
    },

    /// A directory query left this node
    QueryIssued {
        target: NodeId,
        anchor: NodeId,
        at: Duration,
    },

    /// An outstanding search was abandoned
    SearchTimedOut { target: NodeId, at: Duration },

    /// A directory reply resolved a position
    LocationResolved {
        target: NodeId,
        /// Distance to the true position, when an oracle is available
        error: Option<f64>,
        at: Duration,
    },

    /// A neighbor was removed after a link-layer failure
    NeighborLost { neighbor: NodeId, at: Duration },
}

impl RoutingEvent {
    /// When the event happened
    pub fn at(&self) -> Duration {
        match self {
            Self::Originated { at, .. } => *at,
            Self::Forwarded { at, .. } => *at,
            Self::Deferred { at, .. } => *at,
            Self::Delivered { at, .. } => *at,
            Self::Dropped { at, .. } => *at,
            Self::QueryIssued { at, .. } => *at,
            Self::SearchTimedOut { at, .. } => *at,
            Self::LocationResolved { at, .. } => *at,
            Self::NeighborLost { at, .. } => *at,
        }
    }

    /// Create a packet dropped event
    pub fn dropped(packet_id: Option<u32>, reason: DropReason, at: Duration) -> Self {
        Self::Dropped {
            packet_id,
            reason,
            at,
        }
    }

    /// Create a packet forwarded event
    pub fn forwarded(packet_id: u32, next_hop: NodeId, mode: ForwardMode, at: Duration) -> Self {
        Self::Forwarded {
            packet_id,
            next_hop,
            mode,
            at,
        }
    }

    pub fn is_drop(&self) -> bool {
        matches!(self, Self::Dropped { .. })
    }
}
