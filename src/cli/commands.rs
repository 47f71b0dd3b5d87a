//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific
//! modules.

mod backfill;
mod ingest;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "relaystats")]
#[command(about = "Tor relay snapshot store and per-country statistics")]
#[command(version)]
pub struct Cli {
    /// SQLite database path (overrides config file)
    #[arg(long, short = 'd', global = true, env = "RELAYSTATS_DATABASE")]
    database: Option<PathBuf>,

    /// Config file path (defaults to ./relaystats.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Load relay snapshot CSV files into the database
    Ingest {
        /// Snapshot directories, processed in order (defaults to config)
        dirs: Vec<PathBuf>,
    },

    /// Derive per-country relay counts for dates that lack them
    Backfill {
        /// GeoIP database path (overrides config file)
        #[arg(long, short = 'g', env = "RELAYSTATS_GEOIP")]
        geoip: Option<PathBuf>,
    },

    /// Show store contents and pending backfill work
    Status,
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())?.with_database(cli.database.as_deref());

    match cli.command {
        Commands::Ingest { dirs } => ingest::cmd_ingest(&settings, &dirs),
        Commands::Backfill { geoip } => backfill::cmd_backfill(&settings, geoip.as_deref()),
        Commands::Status => status::cmd_status(&settings),
    }
}
