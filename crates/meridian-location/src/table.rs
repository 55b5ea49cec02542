//! Location table with dead-reckoning prediction
//!
//! The [`LocationTable`] caches the last known position, speed and heading
//! of remote nodes. Reads never return a stale raw sample: when time has
//! passed since the sample was taken, the position is extrapolated along
//! the recorded heading.
//!
//! Entries older than the table lifetime are removed by [`LocationTable::purge`].

use std::collections::HashMap;
use std::time::Duration;

use meridian_core::{NodeId, Position};

/// Cached knowledge about one remote node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationEntry {
    /// Last sampled position (the sentinel while a search is outstanding)
    pub position: Position,
    /// Scalar speed in metres per second
    pub speed: f64,
    /// Direction of travel, radians counterclockwise from +x
    pub heading: f64,
    /// When the sample was recorded
    pub updated: Duration,
    /// Sequence number; anchors use 1 for registered nodes
    pub seq: u32,
    /// An unanswered query for this node is outstanding
    pub searching: bool,
}

impl LocationEntry {
    /// Time since the sample was recorded
    pub fn age(&self, now: Duration) -> Duration {
        now.saturating_sub(self.updated)
    }

    /// Position extrapolated to `now`
    pub fn predict(&self, now: Duration) -> Position {
        if !self.position.is_valid() || self.speed == 0.0 || now <= self.updated {
            return self.position;
        }
        let elapsed = (now - self.updated).as_secs_f64();
        self.position.advance(self.heading, self.speed * elapsed)
    }
}

/// Per-node cache of remote positions
#[derive(Debug, Clone)]
pub struct LocationTable {
    entries: HashMap<NodeId, LocationEntry>,
    lifetime: Duration,
}

impl LocationTable {
    /// Create a table whose entries expire after `lifetime`
    pub fn new(lifetime: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Insert or replace the entry for `id`, stamped at `now`
    ///
    /// The heading follows the displacement from the previous valid sample.
    /// It is kept when the node has not moved and starts along +x.
    pub fn upsert(
        &mut self,
        id: NodeId,
        position: Position,
        speed: f64,
        searching: bool,
        seq: u32,
        now: Duration,
    ) {
        let heading = match self.entries.get(&id) {
            Some(prev) if prev.position.is_valid() && position.is_valid() => prev
                .position
                .bearing_to(&position)
                .unwrap_or(prev.heading),
            Some(prev) => prev.heading,
            None => 0.0,
        };

        self.entries.insert(
            id,
            LocationEntry {
                position,
                speed,
                heading,
                updated: now,
                seq,
                searching,
            },
        );
    }

    /// Update position and time of an existing entry
    ///
    /// Speed, heading and sequence number are kept. Returns `false` when
    /// there is no entry for `id`.
    pub fn refresh_position(&mut self, id: NodeId, position: Position, now: Duration) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.position = position;
                entry.updated = now;
                true
            }
            None => false,
        }
    }

    /// Predicted position of `id`, or [`Position::INVALID`] if unknown
    pub fn get_position(&self, id: NodeId, now: Duration) -> Position {
        self.entries
            .get(&id)
            .map(|entry| entry.predict(now))
            .unwrap_or(Position::INVALID)
    }

    pub fn entry(&self, id: NodeId) -> Option<&LocationEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn update_time(&self, id: NodeId) -> Option<Duration> {
        self.entries.get(&id).map(|e| e.updated)
    }

    pub fn speed(&self, id: NodeId) -> Option<f64> {
        self.entries.get(&id).map(|e| e.speed)
    }

    pub fn seq(&self, id: NodeId) -> Option<u32> {
        self.entries.get(&id).map(|e| e.seq)
    }

    /// Whether a search is outstanding (false for unknown ids)
    pub fn is_searching(&self, id: NodeId) -> bool {
        self.entries.get(&id).is_some_and(|e| e.searching)
    }

    pub fn set_searching(&mut self, id: NodeId, searching: bool) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.searching = searching;
        }
    }

    /// Remove entries whose age exceeds the lifetime
    pub fn purge(&mut self, now: Duration) {
        let lifetime = self.lifetime;
        self.entries.retain(|_, entry| entry.age(now) <= lifetime);
    }

    pub fn delete(&mut self, id: NodeId) -> Option<LocationEntry> {
        self.entries.remove(&id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &LocationEntry)> {
        self.entries.iter()
    }
}
