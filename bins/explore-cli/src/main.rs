//! explore-cli — offline driver for the exploration engine: replay a
//! recorded sequence of pose/cloud events through the controller, or
//! validate a config file, without a live bus connection.

mod config;
mod fixture;
mod logging;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use explore::testing::RecordingBus;
use explore::{ExplorationController, FakeClock, RecordingSink, StartOptions};
use fixture::ReplayEvent;
use tracing::info;
use types::Odometry;

#[derive(Parser)]
#[command(name = "explore-cli", about = "Offline driver for the exploration engine")]
struct Args {
    /// Log directory for text logs
    #[arg(long, default_value = "./logs")]
    log_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed a recorded JSON fixture of pose/cloud events through the
    /// controller and print the final status.
    Replay {
        /// Path to a fixture file (see `fixture::Fixture`)
        fixture: PathBuf,

        /// Path to a TOML exploration config, defaults applied if absent
        #[arg(short, long, default_value = "config/explore.toml")]
        config: PathBuf,
    },

    /// Load a TOML config file and report whether it is valid.
    ValidateConfig {
        /// Path to a TOML exploration config
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = logging::init(&args.log_dir, &args.log_level)?;

    match args.command {
        Commands::Replay { fixture, config } => run_replay(&fixture, &config),
        Commands::ValidateConfig { config } => run_validate_config(&config),
    }
}

fn run_replay(fixture_path: &std::path::Path, config_path: &std::path::Path) -> Result<()> {
    let config = config::load(config_path)?;
    let fixture = fixture::load(fixture_path)?;

    let mut controller = ExplorationController::new(config, RecordingBus::default(), RecordingSink::default(), FakeClock::new());

    let result = controller.start_exploration(StartOptions {
        start_position: Some(fixture.start),
        ..Default::default()
    });
    if !result.success {
        anyhow::bail!("start_exploration failed: {}", result.message);
    }
    info!(x = fixture.start.x, y = fixture.start.y, "replay started");

    let mut events = fixture.events;
    events.sort_by_key(|e| e.at_ms);

    for timed in events {
        controller.clock().set_ms(timed.at_ms);
        match timed.event {
            ReplayEvent::Odometry { x, y, z } => {
                controller.on_odometry(Odometry::from_position(types::Vec3::new(x, y, z)));
            }
            ReplayEvent::Cloud { points } => {
                controller.on_point_cloud(types::PointCloud { points, stamp: None });
            }
        }
    }

    let status = controller.get_status();
    info!(
        explored_percentage = status.explored_percentage,
        visited = controller.visited_goals().len(),
        unreachable = controller.unreachable_goals().len(),
        missions_published = controller.bus().missions.len(),
        "replay finished"
    );
    println!("{status:#?}");

    Ok(())
}

fn run_validate_config(config_path: &std::path::Path) -> Result<()> {
    let config = config::load(config_path)?;
    match config.scoring_weights.validate() {
        Ok(()) => {
            println!("config OK: {config:#?}");
            Ok(())
        }
        Err(err) => anyhow::bail!("invalid scoring weights: {err}"),
    }
}
