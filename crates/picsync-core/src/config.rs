//! Centralized Configuration Management
//!
//! Configuration structures shared by the runtime and the binary. Timing
//! behaviour of the session controller is fixed and exposed as constants.

use core::fmt;
use core::time::Duration;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Fixed Timings
// ----------------------------------------------------------------------------

/// Interval between changelist polls once the poller is armed
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Delay before reconnecting after an unexpected disconnect
pub const RECONNECT_DELAY: Duration = Duration::from_secs(15);

/// Pause after a rejected logon
pub const LOGON_FAILURE_PAUSE: Duration = Duration::from_secs(2);

// ----------------------------------------------------------------------------
// Full Run Mode
// ----------------------------------------------------------------------------

/// Catalog synchronization mode
///
/// Serialized as the integers `0`, `1` and `2`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FullRun {
    /// Incremental polling from the last persisted changelist
    #[default]
    Disabled,
    /// Resynchronize every known app and package
    KnownOnly,
    /// Resynchronize every known entity and sweep unknown apps
    IncludeUnknown,
}

impl FullRun {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, FullRun::Disabled)
    }

    /// Whether unknown apps in a bulk reply are handed to the processor
    pub fn dispatches_unknown_apps(&self) -> bool {
        !matches!(self, FullRun::KnownOnly)
    }
}

impl TryFrom<u8> for FullRun {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FullRun::Disabled),
            1 => Ok(FullRun::KnownOnly),
            2 => Ok(FullRun::IncludeUnknown),
            other => Err(format!("full_run must be 0, 1 or 2 (got {})", other)),
        }
    }
}

impl From<FullRun> for u8 {
    fn from(mode: FullRun) -> u8 {
        match mode {
            FullRun::Disabled => 0,
            FullRun::KnownOnly => 1,
            FullRun::IncludeUnknown => 2,
        }
    }
}

impl fmt::Display for FullRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

// ----------------------------------------------------------------------------
// Credentials
// ----------------------------------------------------------------------------

/// Logon details handed to the session layer
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// The password never reaches the logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the controller's input channels
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Session layer → controller
    pub event_buffer_size: usize,
    /// Runtime handle → controller
    pub command_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 256, // product-info replies arrive in bursts
            command_buffer_size: 32,
        }
    }
}

impl ChannelConfig {
    pub fn testing() -> Self {
        Self {
            event_buffer_size: 64,
            command_buffer_size: 16,
        }
    }
}

// ----------------------------------------------------------------------------
// Worker Pool Configuration
// ----------------------------------------------------------------------------

/// Bounds for the per-entity work dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Maximum number of entity units running at once
    pub max_workers: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self { max_workers: 16 }
    }
}

// ----------------------------------------------------------------------------
// Sync Configuration
// ----------------------------------------------------------------------------

/// Everything the session controller needs to run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub full_run: FullRun,
    pub credentials: Credentials,
    pub channels: ChannelConfig,
    pub workers: WorkerPoolConfig,
}

impl SyncConfig {
    pub fn new(full_run: FullRun, credentials: Credentials) -> Self {
        Self {
            full_run,
            credentials,
            ..Self::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
