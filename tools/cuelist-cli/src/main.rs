//! Cuelist CLI: inspect and play timeline documents.
//!
//! Usage:
//!   cuelist validate <PATH>    Load a document and report skipped events
//!   cuelist info <PATH>        Show document information
//!   cuelist verify <PATH>      List verification points
//!   cuelist play <PATH>        Play through a runner, printing frames as JSON

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use cuelist_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "cuelist",
    about = "Timeline scheduling for show control",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a timeline document and report problems
    Validate {
        /// Path to the timeline document
        path: PathBuf,
    },

    /// Show timeline information
    Info {
        /// Path to the timeline document
        path: PathBuf,
    },

    /// List the start/end instants worth previewing
    Verify {
        /// Path to the timeline document
        path: PathBuf,

        /// Print points as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Play a timeline, printing one JSON frame per line
    Play {
        /// Path to the timeline document
        path: PathBuf,

        /// Frame rate (defaults to the configured runner fps)
        #[arg(long)]
        fps: Option<f64>,

        /// Show time to start from, in seconds (may be negative)
        #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
        start_at: f64,

        /// Stop after this many seconds of playback
        #[arg(long)]
        limit: Option<f64>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load();

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    cuelist_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Validate { path } => commands::validate::run(path, &config),
        Commands::Info { path } => commands::info::run(path, &config),
        Commands::Verify { path, json } => commands::verify::run(path, json, &config),
        Commands::Play {
            path,
            fps,
            start_at,
            limit,
        } => commands::play::run(path, fps, start_at, limit, &config),
    }
}
