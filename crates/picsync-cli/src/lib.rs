//! picsync CLI library
//!
//! Configuration, the SQLite-backed datastore and entity processor, and the
//! command handlers behind the `picsync` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod processor;
pub mod store;

pub use cli::{Cli, Commands};
pub use commands::{run_session, CommandDispatcher};
pub use config::AppConfig;
pub use error::{CliError, Result};
pub use processor::StoringProcessor;
pub use store::SqliteStore;
