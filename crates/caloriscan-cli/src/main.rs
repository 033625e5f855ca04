//! CaloriScan CLI - dish detection and nutrition lookup
//!
//! Talks to a CaloriScan server for detection and token status; renders
//! dish payloads from QR text, files or detection results.

mod backends;
mod commands;
mod output;

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;

use caloriscan_core::client::DEFAULT_SERVER_URL;
use caloriscan_core::HttpDetectionClient;

#[derive(Parser)]
#[command(name = "caloriscan")]
#[command(author, version, about = "Dish detection and nutrition CLI", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// CaloriScan server URL
    #[arg(long, env = "CALORISCAN_SERVER", global = true, default_value = DEFAULT_SERVER_URL)]
    server: String,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = 60)]
    timeout: u64,

    /// Output format: table (default) or json
    #[arg(long, global = true, default_value = "table")]
    format: output::OutputFormat,

    /// Suppress progress messages
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show remaining detection calls for the current window
    Status,

    /// Detect the dish in an image file
    Detect {
        /// Path to a PNG or JPEG image
        image: String,

        /// Print the nutrition text exactly as the server returned it
        #[arg(long)]
        raw: bool,
    },

    /// Scan QR payloads from a text source, one decoded code per line
    Scan {
        /// File to read, or `-` for stdin
        #[arg(default_value = "-")]
        source: String,
    },

    /// Capture a frame from a directory of images and detect the dish
    Capture {
        /// Directory whose image files act as cameras
        dir: String,

        /// Camera to use (file name); defaults to the first
        #[arg(long)]
        device: Option<String>,

        /// List cameras and exit
        #[arg(long)]
        list_devices: bool,
    },

    /// Render a dish payload: JSON text, `@file` or `-` for stdin
    Show {
        payload: String,

        /// Change an ingredient quantity by name or table row, e.g.
        /// `--adjust Cheese=+1` or `--adjust '#2=-1'`
        #[arg(long = "adjust", value_name = "NAME=DELTA", allow_hyphen_values = true)]
        adjustments: Vec<String>,
    },

    /// Turn a dish JSON file into compact QR payload text
    Encode {
        /// File to read, or `-` for stdin
        #[arg(default_value = "-")]
        source: String,
    },
}

async fn run(cli: Cli) -> Result<()> {
    let client = HttpDetectionClient::with_timeout(&cli.server, Duration::from_secs(cli.timeout))?;

    // Create context for commands
    let ctx = commands::Context {
        client,
        format: cli.format,
        quiet: cli.quiet,
    };

    // Execute command
    match cli.command {
        Commands::Status => commands::status::execute(&ctx).await,
        Commands::Detect { image, raw } => commands::detect::execute(&ctx, &image, raw).await,
        Commands::Scan { source } => commands::scan::execute(&ctx, &source).await,
        Commands::Capture {
            dir,
            device,
            list_devices,
        } => {
            let args = commands::capture::CaptureArgs {
                dir: &dir,
                device: device.as_deref(),
                list_devices,
            };
            commands::capture::execute(&ctx, args).await
        }
        Commands::Show {
            payload,
            adjustments,
        } => commands::show::execute(&ctx, &payload, &adjustments).await,
        Commands::Encode { source } => commands::encode::execute(&ctx, &source).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }
}
