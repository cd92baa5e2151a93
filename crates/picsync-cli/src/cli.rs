//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "picsync.toml")]
    pub config: PathBuf,

    /// Full-run mode: 0 = incremental, 1 = known entities only, 2 = include unknown apps
    #[arg(long, global = true, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub full_run: Option<u8>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Connect and mirror changelists until interrupted
    Run {
        /// Replay a JSON catalog history instead of a live platform session
        #[arg(long)]
        script: PathBuf,
    },
    /// Create the database schema
    InitDb,
    /// Print the latest persisted changelist
    Status,
}

impl Cli {
    /// Subcommand to run; `status` when none was given
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Status)
    }
}
