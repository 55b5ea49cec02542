//! Node identity and role
//!
//! Nodes are addressed by their IPv4 address, carried on the wire as a
//! big-endian `u32`. The role is fixed for the lifetime of a node.

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Well-known port for forwarding-layer frames (hellos and routed packets)
pub const FORWARDING_PORT: u16 = 666;

/// Well-known port for location directory messages
pub const DIRECTORY_PORT: u16 = 667;

/// Port for application payloads carried by routed datagrams
pub const DATA_PORT: u16 = 9;

/// Identifier of a node (an IPv4 address)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Link-level broadcast address
    pub const BROADCAST: NodeId = NodeId(u32::MAX);

    /// Build an identifier from dotted-quad octets
    pub const fn from_octets(a: u8, b: u8, c: u8, d: u8) -> Self {
        Self(u32::from_be_bytes([a, b, c, d]))
    }

    /// The `n`th host of the 10.0.0.0/8 simulation network (1-based)
    pub const fn host(n: u32) -> Self {
        Self(0x0A00_0000 | (n & 0x00FF_FFFF))
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// The raw wire value
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl From<Ipv4Addr> for NodeId {
    fn from(addr: Ipv4Addr) -> Self {
        Self(u32::from(addr))
    }
}

impl From<NodeId> for Ipv4Addr {
    fn from(id: NodeId) -> Self {
        Ipv4Addr::from(id.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Ipv4Addr::from(self.0))
    }
}

/// What a node is in the network, decided once at startup
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
pub enum Role {
    /// Fixed infrastructure acting as the location directory for its area
    #[display("anchor")]
    Anchor,
    /// Moving participant that resolves positions through its anchor
    #[display("mobile")]
    Mobile,
}

impl Role {
    pub fn is_anchor(&self) -> bool {
        matches!(self, Self::Anchor)
    }
}
