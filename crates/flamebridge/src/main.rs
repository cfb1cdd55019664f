//! FlameBridge - DMX-controlled fire animation streamed over sACN
//!
//! Reads a lighting console's universe from an Enttec DMX USB Pro, renders a
//! per-pixel fire effect and sends it to one or more LED controllers.

#![warn(missing_docs)]

mod app;
mod logging_setup;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use flamebridge_core::BridgeConfig;

#[derive(Parser)]
#[command(
    name = "flamebridge",
    version,
    about = "DMX-controlled fire animation streamed over sACN"
)]
struct Cli {
    /// Configuration file
    #[arg(long, short, global = true, default_value = "flamebridge.toml")]
    config: PathBuf,

    /// Log raw control values and bank levels every 10 frames
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run the bridge until Ctrl+C (default)
    Run,
    /// Load and validate the configuration, then print it
    CheckConfig,
    /// List serial ports and mark likely Enttec widgets
    ListPorts,
}

/// Load the configuration file, or the defaults when it does not exist
fn load_config(path: &Path) -> Result<(BridgeConfig, bool)> {
    if path.exists() {
        let config = BridgeConfig::load(path)
            .with_context(|| format!("Invalid configuration in {:?}", path))?;
        Ok((config, true))
    } else {
        let config = BridgeConfig::default();
        config
            .validate()
            .context("Built-in default configuration is invalid")?;
        Ok((config, false))
    }
}

fn list_ports() -> Result<()> {
    let ports = flamebridge_control::list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }
    println!("Serial ports:");
    for port in &ports {
        println!("  {}", port);
        if let Some(callout) = flamebridge_control::callout_device_hint(&port.name) {
            println!("    macOS: use {} rather than this dial-in device", callout);
        }
    }
    if !ports.iter().any(|p| p.is_ftdi()) {
        println!("\nNo FTDI device found. Is the DMX USB Pro plugged in?");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Cmd::Run) {
        Cmd::ListPorts => list_ports(),
        Cmd::CheckConfig => {
            let (config, from_file) = load_config(&cli.config)?;
            if !from_file {
                println!(
                    "{:?} not found, showing built-in defaults\n",
                    cli.config
                );
            }
            print!("{}", config.summary());
            println!("\nConfiguration OK");
            Ok(())
        }
        Cmd::Run => {
            let (config, from_file) = load_config(&cli.config)?;
            let mut log_config = config.logging.clone();
            if cli.debug {
                log_config = log_config.with_debug();
            }
            let _log_guard = logging_setup::init(&log_config)?;

            if !from_file {
                tracing::warn!(
                    "Config file {:?} not found, using built-in defaults",
                    cli.config
                );
            }
            tracing::info!("FlameBridge {}", env!("CARGO_PKG_VERSION"));
            for line in config.summary().lines().filter(|l| !l.trim().is_empty()) {
                tracing::info!("{}", line);
            }

            app::run(config, cli.debug)
        }
    }
}
