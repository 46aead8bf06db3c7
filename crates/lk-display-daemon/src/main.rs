//! LK Display Daemon
//!
//! Streams CPU, GPU, memory, disk and network telemetry to the USB sensor
//! displays in GAMDIAS ATLAS coolers and HWCX controllers.

mod config;
mod orchestrator;
mod sensors;

use anyhow::{Context, Result};
use clap::Parser;
use lk_display_hw::{DeviceBackend, DeviceManager, HidrawBackend};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use orchestrator::{Orchestrator, Settings};
use sensors::{SensorRoots, Sensors};

#[derive(Parser, Debug)]
#[command(name = "lkdisplayd", version, about = "Hardware monitor for LK USB sensor displays")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// List connected displays and exit
    #[arg(long)]
    scan: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, found) =
        Config::load_or_default(&cli.config).context("Failed to load configuration")?;

    // Setup logging
    let level = if cli.debug || config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    if found {
        info!("Loaded configuration from: {}", cli.config.display());
    } else {
        info!(
            "No configuration at {}, using defaults",
            cli.config.display()
        );
    }

    if cli.scan {
        scan(&HidrawBackend::default());
        return Ok(());
    }

    let sensors = Sensors::discover(SensorRoots::default(), &config).await;
    let devices = DeviceManager::new(HidrawBackend::default());
    let mut orchestrator = Orchestrator::new(Settings::from(&config), sensors, devices);

    orchestrator.run().await?;
    Ok(())
}

/// Prints supported displays, or every hidraw node when none match.
fn scan(backend: &HidrawBackend) {
    let manager = DeviceManager::new(backend.clone());
    let found = manager.discover();

    if !found.is_empty() {
        println!("Supported displays:");
        for info in &found {
            let model = info.supported().map(|s| s.name).unwrap_or("unknown");
            println!(
                "  {}  {:04x}:{:04x}  {} ({})",
                info.path, info.vendor_id, info.product_id, model, info.name
            );
        }
        return;
    }

    println!("No supported display found.");
    let nodes = backend.list_nodes();
    if nodes.is_empty() {
        println!("No hidraw devices present.");
        return;
    }

    println!("hidraw devices:");
    let identified = backend.enumerate();
    for node in nodes {
        let path = node.to_string_lossy();
        match identified.iter().find(|info| info.path == path) {
            Some(info) => println!(
                "  {}  {:04x}:{:04x}  {}",
                info.path, info.vendor_id, info.product_id, info.name
            ),
            None => println!("  {}  (unreadable)", path),
        }
    }
}
