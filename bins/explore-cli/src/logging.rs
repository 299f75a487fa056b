//! Stdout + rolling file logging, matching the daemon's setup.

use std::path::Path;

use anyhow::Result;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init(log_dir: &Path, level: &str) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "explore-cli.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("explore_cli={level},explore={level}")));

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(true).with_thread_ids(false);
    let file_layer = tracing_subscriber::fmt::layer().with_writer(non_blocking_file).with_ansi(false).with_target(true);

    tracing_subscriber::registry().with(filter).with(stdout_layer).with(file_layer).init();

    Ok(guard)
}
