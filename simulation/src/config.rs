//! Simulation configuration

use std::path::Path;
use std::time::Duration;

use meridian_routing::RouterConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration for one simulated run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Unit-disk radio range, metres
    pub radio_range: f64,
    /// Time for a frame to reach its receivers
    pub link_delay: Duration,
    /// Simulated time to run
    pub duration: Duration,
    /// Seed for placement, speeds and traffic
    pub seed: u64,
    /// Interval between data packets in scenarios with traffic
    pub traffic_interval: Duration,
    /// Router settings shared by every node
    pub router: RouterConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            radio_range: 250.0,
            link_delay: Duration::from_millis(1),
            duration: Duration::from_secs(30),
            seed: 1,
            traffic_interval: Duration::from_secs(1),
            router: RouterConfig::default(),
        }
    }
}

impl SimConfig {
    /// Load a JSON configuration; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_router(mut self, router: RouterConfig) -> Self {
        self.router = router;
        self
    }

    /// Router settings with neighbor validity matching the radio range
    pub fn effective_router(&self) -> RouterConfig {
        let mut router = self.router;
        router.neighbors.mobile_range = self.radio_range;
        router.neighbors.anchor_range = self.radio_range;
        router
    }
}
