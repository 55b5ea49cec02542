//! Forwarding decisions

use crate::event::{DropReason, ForwardMode};
use crate::identity::NodeId;

/// Possible outcomes of routing a datagram at one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardDecision {
    /// Hand the packet to `next_hop` using `mode`
    Forward { next_hop: NodeId, mode: ForwardMode },

    /// Buffer until the destination position is known
    Defer,

    /// Drop the packet
    Drop { reason: DropReason },
}

impl ForwardDecision {
    /// The destination is a neighbor
    pub fn direct(next_hop: NodeId) -> Self {
        Self::Forward {
            next_hop,
            mode: ForwardMode::Direct,
        }
    }

    pub fn greedy(next_hop: NodeId) -> Self {
        Self::Forward {
            next_hop,
            mode: ForwardMode::Greedy,
        }
    }

    pub fn recovery(next_hop: NodeId) -> Self {
        Self::Forward {
            next_hop,
            mode: ForwardMode::Recovery,
        }
    }

    pub fn defer() -> Self {
        Self::Defer
    }

    pub fn drop(reason: DropReason) -> Self {
        Self::Drop { reason }
    }

    /// Next hop, if the packet leaves this node
    pub fn next_hop(&self) -> Option<NodeId> {
        match self {
            Self::Forward { next_hop, .. } => Some(*next_hop),
            _ => None,
        }
    }

    pub fn is_forward(&self) -> bool {
        matches!(self, Self::Forward { .. })
    }

    pub fn is_recovery(&self) -> bool {
        matches!(
            self,
            Self::Forward {
                mode: ForwardMode::Recovery,
                ..
            }
        )
    }

    pub fn is_defer(&self) -> bool {
        matches!(self, Self::Defer)
    }

    pub fn is_drop(&self) -> bool {
        matches!(self, Self::Drop { .. })
    }
}
