//! Structured logging for Meridian nodes and simulations
//!
//! Every Meridian crate logs through `tracing`. This crate wires those
//! events to outputs:
//!
//! - **JSONL Output**: one JSON object per line, for post-run analysis (default)
//! - **Pretty Console**: human-readable output for development
//! - **File Output**: a single truncated file or daily/hourly rotation via
//!   tracing-appender
//! - **Node Context**: a `node` span naming the node that handles an input
//!
//! `RUST_LOG` overrides the configured filter.
//!
//! # Quick Start
//!
//! ```ignore
//! use meridian_logging::{LogConfig, MeridianSubscriberBuilder};
//!
//! // JSONL to stderr
//! MeridianSubscriberBuilder::new().init();
//!
//! // Development mode with pretty output
//! MeridianSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```
//!
//! # Node Context
//!
//! ```ignore
//! use meridian_logging::NodeContext;
//!
//! let _entered = NodeContext::new(id, role).span().entered();
//! // Events emitted here carry node = "10.0.0.4", role = "mobile"
//! ```

pub mod config;
pub mod context;
pub mod layers;

pub use config::{
    ConsoleFormat, FileConfig, JsonlConfig, LOCATION_TARGET, LogConfig, ROUTING_TARGET,
    RotationStrategy, WORLD_TARGET,
};
pub use context::{NodeContext, NodeContextGuard};
pub use layers::{NodeContextExtension, NodeContextLayer, jsonl_layer};

use std::fs::{self, File};
use std::io::IsTerminal;

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors initializing the logging subscriber
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Failed to open log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid filter directive: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Global subscriber already set: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Builder for configuring and initializing the Meridian logging subscriber
///
/// By default, console output uses JSONL format. Use `LogConfig::development()`
/// for human-readable pretty output during development.
pub struct MeridianSubscriberBuilder {
    config: LogConfig,
}

impl MeridianSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// Set the console output format
    pub fn with_console(mut self, format: ConsoleFormat) -> Self {
        self.config.console = format;
        self
    }

    /// Log every simulated radio frame
    pub fn with_frame_trace(mut self) -> Self {
        self.config = self.config.with_frame_trace();
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Initialize the subscriber globally
    ///
    /// Returns the file writer guard, which must be kept alive for the
    /// duration of the program. Initialization failures are reported on
    /// stderr and logging stays disabled.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: Failed to initialize logging: {}", e);
                None
            }
        }
    }

    /// Try to initialize the subscriber globally
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LogError> {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(self.config.filter_directives())?,
        };

        let console = self.config.console;
        let pretty_layer = (console == ConsoleFormat::Pretty).then(|| {
            tracing_subscriber::fmt::layer()
                .with_ansi(std::io::stderr().is_terminal())
                .with_target(true)
                .with_writer(std::io::stderr)
        });
        let console_jsonl_layer = (console == ConsoleFormat::Jsonl)
            .then(|| jsonl_layer(std::io::stderr, &self.config.jsonl));

        let (file_layer, guard) = match &self.config.file {
            Some(file_config) => {
                let (writer, guard) = file_writer(file_config)?;
                (Some(jsonl_layer(writer, &self.config.jsonl)), Some(guard))
            }
            None => (None, None),
        };

        Registry::default()
            .with(env_filter)
            .with(NodeContextLayer::new())
            .with(pretty_layer)
            .with(console_jsonl_layer)
            .with(file_layer)
            .try_init()?;

        Ok(guard)
    }
}

impl Default for MeridianSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-blocking writer for the configured log file
///
/// `Never` truncates a single `<prefix>.log`; the rotating strategies append
/// to dated files.
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LogError> {
    fs::create_dir_all(&config.directory)?;
    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.log", config.prefix));
            return Ok(tracing_appender::non_blocking(File::create(path)?));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };
    let appender = RollingFileAppender::new(rotation, &config.directory, &config.prefix);
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging with default settings (JSONL to console)
pub fn init_default() -> Option<WorkerGuard> {
    MeridianSubscriberBuilder::new().init()
}

/// Initialize logging for development (pretty console, routing and directory at debug)
pub fn init_development() -> Option<WorkerGuard> {
    MeridianSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Initialize logging for testing (minimal output, repeated calls are ignored)
pub fn init_testing() {
    let _ = MeridianSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creation() {
        let builder = MeridianSubscriberBuilder::new();
        assert_eq!(builder.config().level, "info");
        assert_eq!(builder.config().console, ConsoleFormat::Jsonl);
    }

    #[test]
    fn test_builder_with_config() {
        let builder = MeridianSubscriberBuilder::new().with_config(LogConfig::development());
        assert_eq!(builder.config().console, ConsoleFormat::Pretty);
        assert_eq!(builder.config().targets[ROUTING_TARGET], "debug");
    }

    #[test]
    fn test_builder_with_level_console_and_frames() {
        let builder = MeridianSubscriberBuilder::new()
            .with_level("debug")
            .with_console(ConsoleFormat::Off)
            .with_frame_trace();
        assert_eq!(builder.config().console, ConsoleFormat::Off);
        assert_eq!(
            builder.config().filter_directives(),
            "debug,meridian_simulation::world=trace"
        );
    }

    #[test]
    fn test_file_writer_truncates_single_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path();
        let config = FileConfig {
            directory: dir.to_path_buf(),
            prefix: "unit".to_string(),
            rotation: RotationStrategy::Never,
        };
        fs::write(dir.join("unit.log"), b"old contents").unwrap();

        let (_writer, guard) = file_writer(&config).unwrap();
        drop(guard);

        assert_eq!(fs::read(dir.join("unit.log")).unwrap().len(), 0);
    }
}
