// SPDX-License-Identifier: GPL-3.0-only

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "qrscan")]
#[command(about = "Scan QR codes from a camera")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    scan: ScanArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan until a QR code is found (default)
    Scan(ScanArgs),

    /// List available cameras
    List,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScanArgs {
    /// V4L2 device path (default: first capture device)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Requested capture width
    #[arg(long)]
    pub width: Option<u32>,

    /// Requested capture height
    #[arg(long)]
    pub height: Option<u32>,

    /// Requested frame rate
    #[arg(long)]
    pub fps: Option<u32>,

    /// Scan an image file instead of a camera
    #[arg(short, long)]
    pub image: Option<PathBuf>,

    /// Keep the latest preview as DIR/preview.jpg
    #[arg(long, value_name = "DIR")]
    pub preview_dir: Option<PathBuf>,

    /// Give up after this many seconds
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Config file (default: ~/.config/qrscan/config.json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=qrscan=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::List) => cli::list_devices(),
        Some(Commands::Scan(args)) => cli::scan(args),
        None => cli::scan(cli.scan),
    }
}
