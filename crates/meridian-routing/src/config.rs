//! Router configuration

use std::time::Duration;

use meridian_location::DirectoryConfig;
use serde::{Deserialize, Serialize};

use crate::neighbor::PurgePolicy;

/// Configuration of one [`GeoRouter`](crate::GeoRouter)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Period of forwarding-layer hellos (mobile nodes only)
    pub hello_interval: Duration,
    /// Neighbor lifetime and range eviction
    pub neighbors: PurgePolicy,
    /// Location table and search timing
    pub directory: DirectoryConfig,
    /// Maximum number of deferred packets
    pub queue_capacity: usize,
    /// Maximum time a packet may stay deferred
    pub queue_max_age: Duration,
    /// Interval between deferred queue re-checks
    pub queue_recheck_interval: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            hello_interval: Duration::from_secs(1),
            neighbors: PurgePolicy::default(),
            directory: DirectoryConfig::default(),
            queue_capacity: 64,
            queue_max_age: Duration::from_secs(30),
            queue_recheck_interval: Duration::from_millis(500),
        }
    }
}

impl RouterConfig {
    pub fn with_hello_interval(mut self, interval: Duration) -> Self {
        self.hello_interval = interval;
        self
    }

    pub fn with_neighbors(mut self, policy: PurgePolicy) -> Self {
        self.neighbors = policy;
        self
    }

    pub fn with_directory(mut self, directory: DirectoryConfig) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_queue(mut self, capacity: usize, max_age: Duration) -> Self {
        self.queue_capacity = capacity;
        self.queue_max_age = max_age;
        self
    }

    pub fn with_queue_recheck_interval(mut self, interval: Duration) -> Self {
        self.queue_recheck_interval = interval;
        self
    }

    /// Range within which neighbors of a mobile node are kept
    pub fn with_radio_range(mut self, range: f64) -> Self {
        self.neighbors.mobile_range = range;
        self
    }
}
