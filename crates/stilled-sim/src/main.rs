//! # Stilled Sim
//!
//! Headless driver for the spectral entity of The Stilled Hour.
//!
//! Loads a scenario, builds a box-obstacle room with a scripted target and
//! runs one agent at a fixed timestep:
//! - Config: scenario and NPC tuning from TOML
//! - World: box room implementing the agent's collaborator traits
//! - Runner: tick loop, event draining and run summary

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod config;
mod runner;
mod world;

use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{SimConfig, CONFIG_FILE};
use crate::runner::Simulation;

/// Main entry point.
fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the summary
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("stilled=info".parse()?))
        .init();

    info!("Stilled sim starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args_os().skip(1);
    let first = args.next();

    // `--init [path]` writes the default scenario and exits
    if first.as_deref() == Some(OsStr::new("--init")) {
        let path = args.next().map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);
        SimConfig::default()
            .save_to(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        return Ok(());
    }

    let path = first.map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);
    let config = SimConfig::load_from(&path);

    let summary = Simulation::new(config)?.run();
    let json = serde_json::to_string_pretty(&summary).context("failed to encode summary")?;
    println!("{json}");

    Ok(())
}
