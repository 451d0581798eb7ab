//! mdholo - proximity-driven floating text holograms
//!
//! Headless host: restores stored holograms, runs the visibility scheduler
//! against simulated viewers, executes a command script, then shuts down.

mod command_script;
mod commands;
mod config;
mod headless;

use anyhow::{Context, Result};
use clap::Parser;
use headless::HeadlessConfig;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "mdholo", version, about = "Hologram visibility host")]
struct Cli {
    /// Host configuration (TOML).
    #[arg(long, default_value = config::DEFAULT_HOST_CONFIG_PATH)]
    config: PathBuf,
    /// Override the hologram store location.
    #[arg(long)]
    data: Option<PathBuf>,
    /// Scheduler passes to run before shutting down.
    #[arg(long, default_value_t = 40)]
    ticks: u64,
    /// Simulated viewers walking around the first configured world.
    #[arg(long, default_value_t = 4)]
    viewers: u32,
    /// Seed for viewer placement and movement.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// JSON script of commands and viewer placements keyed by pass.
    #[arg(long)]
    script: Option<PathBuf>,
    /// Write per-pass events as JSONL.
    #[arg(long)]
    events: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize tracing with INFO level by default (can be overridden via RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting mdholo v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let mut host = config::load_host_config(&cli.config);
    if let Some(data) = cli.data {
        host.data_path = data;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;
    let summary = runtime.block_on(headless::run(HeadlessConfig {
        host,
        ticks: cli.ticks,
        viewers: cli.viewers,
        seed: cli.seed,
        command_script: cli.script,
        events: cli.events,
    }))?;

    info!(
        ticks = summary.ticks,
        spawns = summary.frames.spawns,
        despawns = summary.frames.despawns,
        updates = summary.frames.updates,
        moves = summary.frames.moves,
        saved = summary.shutdown.saved,
        "mdholo exiting"
    );
    Ok(())
}
