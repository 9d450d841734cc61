use anyhow::Result;
use clap::{Parser, Subcommand};
use log::debug;
use std::path::PathBuf;

mod commands;
mod settings;
mod utils;

use settings::Settings;

/// meshstat: mesh telemetry frame decoder and delivery statistics
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Configuration file (TOML)
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode hex-encoded frames given on the command line
    Decode {
        /// Frames as hex strings
        #[clap(required = true)]
        frames: Vec<String>,
    },

    /// Replay a capture file with one hex-encoded frame per line
    Replay {
        /// Capture file
        file: PathBuf,

        /// Time to wait for queued reports to be sent, in milliseconds
        #[clap(long, default_value = "5000")]
        drain_timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if cli.verbose { "debug" } else { "info" }
    )).init();

    let settings = Settings::load(cli.config.as_deref())?;
    debug!("Loaded settings: {:?}", settings);

    // Execute the specified command
    match cli.command {
        Commands::Decode { frames } => {
            commands::decode::decode_frames(&settings, frames).await?;
        },
        Commands::Replay { file, drain_timeout } => {
            commands::replay::replay_file(&settings, &file, drain_timeout).await?;
        },
    }

    Ok(())
}
