//! os9-reconcile - command-line front end for the reconciliation engine.
//!
//! Reads a running-configuration dump and a YAML manifest, runs a full
//! reconciliation pass, and prints the resulting commands. Transporting
//! the commands to the device is left to the caller.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

use os9_reconcile::{reconcile, render_fragments, Manifest};

#[derive(Debug, Parser)]
#[command(
    name = "os9-reconcile",
    version,
    about = "Compute the CLI commands that bring an OS9 switch to a declared target state"
)]
struct Cli {
    /// Path to the device's running-configuration text
    #[arg(long)]
    running_config: PathBuf,

    /// Path to the YAML manifest describing the target state
    #[arg(long)]
    manifest: PathBuf,

    /// Print the command fragments as JSON instead of rendered text
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Initializes tracing/logging subsystem.
///
/// Logs go to stderr so stdout carries nothing but the computed commands.
fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let running_config = fs::read_to_string(&cli.running_config).with_context(|| {
        format!(
            "failed to read running configuration from {}",
            cli.running_config.display()
        )
    })?;
    let manifest_text = fs::read_to_string(&cli.manifest)
        .with_context(|| format!("failed to read manifest from {}", cli.manifest.display()))?;
    let manifest: Manifest =
        serde_yaml::from_str(&manifest_text).context("failed to parse manifest YAML")?;

    let output = reconcile(&running_config, &manifest)?;
    for warning in &output.warnings {
        warn!("{}", warning);
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&output.fragments)?);
    } else {
        print!("{}", render_fragments(&output.fragments));
    }
    Ok(())
}
