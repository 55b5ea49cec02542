//! Meridian - geographic routing simulator
//!
//! Runs the built-in scenarios and prints delivery and directory
//! statistics.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use meridian_logging::{ConsoleFormat, FileConfig, LogConfig, MeridianSubscriberBuilder};
use meridian_simulation::scenarios::{self, HighwayParams};
use meridian_simulation::{SimConfig, World};

#[derive(Parser)]
#[command(
    name = "meridian-sim",
    about = "Geographic forwarding with an anchor location directory",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines instead of pretty text
    #[arg(long, global = true)]
    json_logs: bool,

    /// Also write JSONL logs to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log every radio frame at trace level
    #[arg(long, global = true)]
    trace_frames: bool,

    /// JSON simulation config; missing fields take their defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the random seed
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Override the simulated duration, seconds
    #[arg(short, long, global = true)]
    duration: Option<u64>,

    /// Print final statistics as JSON
    #[arg(long, global = true)]
    stats_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mobiles in a line forwarding greedily to an anchor
    Line,

    /// Routing around a void with the right-hand rule
    Void,

    /// Location lookup across two anchors
    Lookup,

    /// Vehicles on a ring road with roadside anchors
    Highway {
        /// Number of vehicles
        #[arg(long, default_value = "20")]
        vehicles: u32,

        /// Number of anchors
        #[arg(long, default_value = "3")]
        anchors: u32,

        /// Ring road length, metres
        #[arg(long, default_value = "3000")]
        length: f64,

        /// Random traffic flows
        #[arg(long, default_value = "5")]
        flows: u32,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logging = MeridianSubscriberBuilder::new().with_config(LogConfig::development());
    if cli.verbose {
        logging = logging.with_level("debug");
    }
    if cli.json_logs {
        logging = logging.with_console(ConsoleFormat::Jsonl);
    }
    if cli.trace_frames {
        logging = logging.with_frame_trace();
    }
    if let Some(directory) = &cli.log_dir {
        logging = logging.with_file_output(FileConfig::in_dir(directory));
    }
    let _guard = logging.try_init().context("initializing logging")?;

    let mut config = match &cli.config {
        Some(path) => SimConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SimConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }
    if let Some(secs) = cli.duration {
        config = config.with_duration(Duration::from_secs(secs));
    }

    let world = match cli.command {
        Commands::Line => scenarios::run_greedy_line(config),
        Commands::Void => scenarios::run_void(config),
        Commands::Lookup => scenarios::run_directory_lookup(config),
        Commands::Highway {
            vehicles,
            anchors,
            length,
            flows,
        } => {
            let params = HighwayParams {
                vehicles,
                anchors,
                length,
                flows,
                ..Default::default()
            };
            scenarios::run_highway(config, params)
        }
    };

    if cli.stats_json {
        print_stats_json(&world)?;
    }

    Ok(())
}

fn print_stats_json(world: &World) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(world.stats()).context("serializing stats")?;
    println!("{}", json);
    Ok(())
}
