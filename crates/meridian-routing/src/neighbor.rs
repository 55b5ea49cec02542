//! Neighbor table with greedy and perimeter selection
//!
//! The [`NeighborTable`] holds the last announced position of every node
//! heard within the neighbor lifetime. It answers the two next-hop questions
//! of geographic forwarding:
//!
//! - [`NeighborTable::best_neighbor`]: the neighbor closest to the target,
//!   if it is strictly closer than this node (greedy progress)
//! - [`NeighborTable::best_angle`]: the first neighbor counterclockwise
//!   from a reference direction (right-hand rule)

use std::collections::HashMap;
use std::f64::consts::TAU;
use std::time::Duration;

use meridian_core::{ccw_angle, NodeId, Position, Role};
use serde::{Deserialize, Serialize};

/// When neighbors are evicted
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PurgePolicy {
    /// Age at which an entry is discarded
    pub lifetime: Duration,
    /// Validity range of a mobile node's neighbors, metres
    pub mobile_range: f64,
    /// Validity range of an anchor's neighbors, metres
    pub anchor_range: f64,
}

impl Default for PurgePolicy {
    fn default() -> Self {
        Self {
            lifetime: Duration::from_secs(2),
            mobile_range: 250.0,
            anchor_range: 250.0,
        }
    }
}

impl PurgePolicy {
    /// Range beyond which a neighbor of a node with `role` is evicted
    pub fn range_for(&self, role: Role) -> f64 {
        match role {
            Role::Anchor => self.anchor_range,
            Role::Mobile => self.mobile_range,
        }
    }
}

/// A neighbor as last heard
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborEntry {
    pub position: Position,
    pub updated: Duration,
}

/// One-hop neighbors of the local node
#[derive(Debug, Clone, Default)]
pub struct NeighborTable {
    entries: HashMap<NodeId, NeighborEntry>,
    policy: PurgePolicy,
}

impl NeighborTable {
    pub fn new(policy: PurgePolicy) -> Self {
        Self {
            entries: HashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &PurgePolicy {
        &self.policy
    }

    /// Insert or refresh a neighbor, stamped at `now`
    pub fn upsert(&mut self, id: NodeId, position: Position, now: Duration) {
        self.entries.insert(
            id,
            NeighborEntry {
                position,
                updated: now,
            },
        );
    }

    /// Evict neighbors that are too old or out of range
    ///
    /// Returns the number of evicted entries.
    pub fn purge(&mut self, self_position: Position, role: Role, now: Duration) -> usize {
        let lifetime = self.policy.lifetime;
        let range = self.policy.range_for(role);
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            now.saturating_sub(entry.updated) < lifetime
                && entry.position.distance_to(&self_position) <= range
        });
        before - self.entries.len()
    }

    pub fn is_neighbor(&self, id: NodeId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&NeighborEntry> {
        self.entries.get(&id)
    }

    /// Drop a neighbor reported unreachable by the link layer
    pub fn remove(&mut self, id: NodeId) -> Option<NeighborEntry> {
        self.entries.remove(&id)
    }

    /// Greedy next hop toward `target`
    ///
    /// Returns the neighbor closest to `target` only if it is strictly
    /// closer than `self_position`. Ties go to the lowest id.
    pub fn best_neighbor(&self, target: Position, self_position: Position) -> Option<NodeId> {
        let own = self_position.distance_to(&target);
        self.entries
            .iter()
            .map(|(id, entry)| (*id, entry.position.distance_to(&target)))
            .filter(|(_, distance)| *distance < own)
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(id, _)| id)
    }

    /// Right-hand rule next hop
    ///
    /// Picks the neighbor with the smallest counterclockwise angle from the
    /// direction `self_position -> reference`. An angle of zero counts as a
    /// full turn, so a neighbor lying on the reference direction is taken
    /// last. Returns `None` only when there are no neighbors.
    pub fn best_angle(&self, reference: Position, self_position: Position) -> Option<NodeId> {
        let reference_bearing = self_position.bearing_to(&reference).unwrap_or(0.0);
        self.entries
            .iter()
            .map(|(id, entry)| {
                let angle = self_position
                    .bearing_to(&entry.position)
                    .map(|bearing| ccw_angle(reference_bearing, bearing))
                    .filter(|angle| *angle > 0.0)
                    .unwrap_or(TAU);
                (*id, angle)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NeighborEntry)> {
        self.entries.iter()
    }
}
