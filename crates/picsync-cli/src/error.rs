//! Error handling for the picsync CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("picsync error: {0}")]
    Picsync(#[from] picsync_core::PicsyncError),

    #[error("Controller error: {0}")]
    Controller(#[from] picsync_runtime::ControllerError),

    #[error("Datastore error: {0}")]
    Datastore(#[from] picsync_core::DatastoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session script error: {0}")]
    Script(#[from] picsync_harness::ScriptError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::Config(err.to_string())
    }
}
