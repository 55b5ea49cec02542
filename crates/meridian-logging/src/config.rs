//! Logging configuration
//!
//! Presets follow the ways Meridian is run: interactively while working on
//! a scenario, recorded to a JSONL file for post-run analysis, or quietly
//! under `cargo test`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Forwarding decisions, hellos and queue activity
pub const ROUTING_TARGET: &str = "meridian_routing";

/// Directory registrations, queries and anchor searches
pub const LOCATION_TARGET: &str = "meridian_location";

/// Per-frame radio trace of the simulated world
pub const WORLD_TARGET: &str = "meridian_simulation::world";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level for targets without an override; `RUST_LOG` replaces the
    /// whole filter
    pub level: String,

    /// Console output on stderr
    pub console: ConsoleFormat,

    /// JSONL file output
    pub file: Option<FileConfig>,

    pub jsonl: JsonlConfig,

    /// Per-target levels, e.g. `meridian_routing = "trace"`
    pub targets: BTreeMap<String, String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: ConsoleFormat::Jsonl,
            file: None,
            jsonl: JsonlConfig::default(),
            targets: BTreeMap::new(),
        }
    }
}

impl LogConfig {
    /// Pretty console with routing and directory decisions
    pub fn development() -> Self {
        Self {
            console: ConsoleFormat::Pretty,
            ..Default::default()
        }
        .with_target(ROUTING_TARGET, "debug")
        .with_target(LOCATION_TARGET, "debug")
    }

    /// Everything down to the frame trace, written to `<dir>/meridian-sim.log`
    pub fn recorded(dir: impl Into<PathBuf>) -> Self {
        Self {
            console: ConsoleFormat::Off,
            file: Some(FileConfig::in_dir(dir)),
            jsonl: JsonlConfig {
                span_list: true,
                source_location: false,
            },
            ..Default::default()
        }
        .with_target(ROUTING_TARGET, "debug")
        .with_target(LOCATION_TARGET, "debug")
        .with_frame_trace()
    }

    /// Warnings only
    pub fn testing() -> Self {
        Self {
            level: "warn".to_string(),
            console: ConsoleFormat::Pretty,
            ..Default::default()
        }
    }

    pub fn with_target(mut self, target: impl Into<String>, level: impl Into<String>) -> Self {
        self.targets.insert(target.into(), level.into());
        self
    }

    /// Log every frame put on the air by the simulated radio
    pub fn with_frame_trace(self) -> Self {
        self.with_target(WORLD_TARGET, "trace")
    }

    /// The default level followed by target overrides, in target order
    pub fn filter_directives(&self) -> String {
        std::iter::once(self.level.clone())
            .chain(self.targets.iter().map(|(t, l)| format!("{t}={l}")))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleFormat {
    Off,
    /// Human-readable, colored when stderr is a terminal
    Pretty,
    #[default]
    Jsonl,
}

/// JSONL file output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// File name prefix; a non-rotating file is `<prefix>.log`
    pub prefix: String,
    pub rotation: RotationStrategy,
}

impl FileConfig {
    /// A single `meridian-sim.log` in `dir`, truncated on start
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            directory: dir.into(),
            prefix: "meridian-sim".to_string(),
            rotation: RotationStrategy::Never,
        }
    }
}

/// File rotation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotationStrategy {
    Daily,
    Hourly,
    /// Single file, truncated on start
    #[default]
    Never,
}

/// JSONL record contents
///
/// Every record carries the innermost span, so events emitted while a node
/// handles an input name that node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonlConfig {
    /// Include the full list of entered spans
    pub span_list: bool,
    /// Include source file and line
    pub source_location: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.console, ConsoleFormat::Jsonl);
        assert!(config.file.is_none());
        assert_eq!(config.filter_directives(), "info");
    }

    #[test]
    fn test_development_config() {
        let config = LogConfig::development();
        assert_eq!(config.console, ConsoleFormat::Pretty);
        assert_eq!(
            config.filter_directives(),
            "info,meridian_location=debug,meridian_routing=debug"
        );
    }

    #[test]
    fn test_recorded_config_traces_frames() {
        let config = LogConfig::recorded("/tmp/run-7");
        assert_eq!(config.console, ConsoleFormat::Off);
        let file = config.file.as_ref().unwrap();
        assert_eq!(file.directory, PathBuf::from("/tmp/run-7"));
        assert_eq!(file.prefix, "meridian-sim");
        assert_eq!(config.targets[WORLD_TARGET], "trace");
        assert!(config.filter_directives().ends_with("meridian_simulation::world=trace"));
    }

    #[test]
    fn test_filter_directives() {
        let config = LogConfig::testing()
            .with_target(ROUTING_TARGET, "trace")
            .with_target(LOCATION_TARGET, "debug");
        assert_eq!(
            config.filter_directives(),
            "warn,meridian_location=debug,meridian_routing=trace"
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "console": "off",
            "file": { "directory": "out", "prefix": "run", "rotation": "Hourly" },
            "targets": { "meridian_routing": "trace" }
        }"#;
        let config: LogConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.level, "info");
        assert_eq!(config.console, ConsoleFormat::Off);
        assert_eq!(config.file.as_ref().unwrap().rotation, RotationStrategy::Hourly);
        assert_eq!(config.jsonl, JsonlConfig::default());
        assert_eq!(config.filter_directives(), "info,meridian_routing=trace");
    }
}
