//! picsync CLI Configuration Management
//!
//! Configuration is layered with this priority: command line flags, then
//! environment variables (`PICSYNC_USERNAME`, `PICSYNC_PASSWORD`), then the
//! TOML file, then defaults.

use anyhow::Context;
use picsync_core::{
    config::{ChannelConfig, WorkerPoolConfig},
    Credentials, FullRun, SyncConfig,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{CliError, Result};

pub const USERNAME_ENV: &str = "PICSYNC_USERNAME";
pub const PASSWORD_ENV: &str = "PICSYNC_PASSWORD";

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub full_run: FullRun,
    pub credentials: Credentials,
    pub database: DatabaseConfig,
    pub runtime: RuntimeConfig,
    pub announce: AnnounceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite connection URL
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://picsync.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Entity units processed at once
    pub max_workers: usize,
    pub event_buffer_size: usize,
    pub command_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let channels = ChannelConfig::default();
        Self {
            max_workers: WorkerPoolConfig::default().max_workers,
            event_buffer_size: channels.event_buffer_size,
            command_buffer_size: channels.command_buffer_size,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnounceConfig {
    /// Prepended to every announcement
    pub prefix: Option<String>,
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            Self::load_from_file(path)
        } else {
            info!("{} not found, using default configuration", path.display());
            Ok(Self::default())
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply credential overrides from the environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(USERNAME_ENV).ok(),
            std::env::var(PASSWORD_ENV).ok(),
        );
    }

    fn apply_overrides(&mut self, username: Option<String>, password: Option<String>) {
        if let Some(username) = username {
            self.credentials.username = username;
        }
        if let Some(password) = password {
            self.credentials.password = password;
        }
    }

    /// Apply a `--full-run` flag
    pub fn apply_full_run(&mut self, full_run: Option<u8>) -> Result<()> {
        if let Some(value) = full_run {
            self.full_run = FullRun::try_from(value).map_err(CliError::Config)?;
        }
        Ok(())
    }

    /// Checks needed before starting a session
    pub fn validate(&self) -> Result<()> {
        if self.credentials.username.trim().is_empty() {
            return Err(CliError::Config(format!(
                "A username is required (set credentials.username or {})",
                USERNAME_ENV
            )));
        }
        if self.runtime.max_workers == 0 {
            return Err(CliError::Config(
                "runtime.max_workers must be greater than 0".to_string(),
            ));
        }
        if self.runtime.event_buffer_size == 0 || self.runtime.command_buffer_size == 0 {
            return Err(CliError::Config(
                "Channel buffer sizes must be greater than 0".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(CliError::Config(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig::new(self.full_run, self.credentials.clone());
        config.channels = ChannelConfig {
            event_buffer_size: self.runtime.event_buffer_size,
            command_buffer_size: self.runtime.command_buffer_size,
        };
        config.workers = WorkerPoolConfig {
            max_workers: self.runtime.max_workers,
        };
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_file() {
        let config = AppConfig::from_toml(
            r#"
            full_run = 2

            [credentials]
            username = "mirror"
            password = "hunter2"

            [database]
            url = "sqlite://catalog.db"

            [runtime]
            max_workers = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.full_run, FullRun::IncludeUnknown);
        assert_eq!(config.credentials.username, "mirror");
        assert_eq!(config.database.url, "sqlite://catalog.db");
        assert_eq!(config.database.max_connections, 5);
        assert!(config.validate().is_ok());

        let sync = config.to_sync_config();
        assert_eq!(sync.workers.max_workers, 4);
        assert_eq!(sync.channels.event_buffer_size, 256);
    }

    #[test]
    fn test_invalid_full_run_is_rejected() {
        assert!(AppConfig::from_toml("full_run = 7").is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_err());

        config.apply_overrides(Some("mirror".to_string()), None);
        config.apply_full_run(Some(1)).unwrap();
        assert_eq!(config.credentials.username, "mirror");
        assert_eq!(config.full_run, FullRun::KnownOnly);
        assert!(config.validate().is_ok());

        assert!(config.apply_full_run(Some(9)).is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = AppConfig::default();
        config.credentials.username = "mirror".to_string();
        config.runtime.max_workers = 0;
        assert!(config.validate().is_err());
    }
}
