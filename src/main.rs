// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-bridge")]
#[command(about = "Camera session control core, driven against a virtual camera")]
#[command(version = camera_bridge::constants::app_info::version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Take a picture on the virtual camera with a scripted AE sequence
    Simulate {
        /// AE states reported after the AF trigger, comma separated
        /// (inactive, searching, converged, locked, flash-required, precapture)
        #[arg(long, default_value = "searching,precapture,converged")]
        ae: String,

        /// Use the front camera
        #[arg(long)]
        front: bool,

        /// Flash mode constant (0 off, 1 on, 2 torch, 3 auto, 4 red eye)
        #[arg(long, default_value = "0")]
        flash: i32,

        /// Capture without locking focus first
        #[arg(long)]
        no_autofocus: bool,

        /// JPEG quality in [0.0, 1.0]
        #[arg(short, long)]
        quality: Option<f64>,

        /// Directory to save the picture in (default: configured photo directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Describe the picture without writing a file
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the effective configuration
    Config {
        /// Configuration file (default: <config dir>/camera-bridge/config.json)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_bridge=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => cli::list_cameras(),
        Commands::Simulate {
            ae,
            front,
            flash,
            no_autofocus,
            quality,
            output,
            dry_run,
        } => cli::simulate(cli::SimulateOptions {
            ae_sequence: ae,
            front,
            flash,
            autofocus: !no_autofocus,
            quality,
            output,
            dry_run,
        }),
        Commands::Config { path } => cli::show_config(path),
    }
}
