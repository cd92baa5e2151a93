//! Core types for the picsync catalog mirror
//!
//! Newtype identifiers for catalog entities, change numbers and correlation
//! jobs, plus the timestamp/time-source pair used by persistence.

use core::fmt;
use core::ops::Sub;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Change Number
// ----------------------------------------------------------------------------

/// Platform-assigned, monotonically increasing marker of catalog state
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChangeNumber(u32);

impl ChangeNumber {
    /// No changelist history is known
    pub const NONE: Self = Self(0);

    /// Full-run sentinel: request every change from the beginning
    pub const FULL_RUN_SENTINEL: Self = Self(1);

    /// Full-run guard: the full-run request has already been issued
    pub const FULL_RUN_ISSUED: Self = Self(2);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for ChangeNumber {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for ChangeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Entity Identifiers
// ----------------------------------------------------------------------------

/// Identifier of an application in the remote catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(pub u32);

/// Identifier of a package (subscription) in the remote catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(pub u32);

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of catalog entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    App,
    Package,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::App => "app",
            EntityKind::Package => "package",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a single catalog entity of either kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    App(AppId),
    Package(PackageId),
}

impl EntityRef {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::App(_) => EntityKind::App,
            EntityRef::Package(_) => EntityKind::Package,
        }
    }

    pub fn raw_id(&self) -> u32 {
        match self {
            EntityRef::App(id) => id.0,
            EntityRef::Package(id) => id.0,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.raw_id())
    }
}

// ----------------------------------------------------------------------------
// Job Identifier
// ----------------------------------------------------------------------------

/// Opaque correlation token issued by the session layer for an async request
///
/// Unique per session lifetime; the controller never fabricates one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Session Result Codes
// ----------------------------------------------------------------------------

/// Result code reported by the session layer for connect/logon attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultCode {
    Ok,
    Fail,
    InvalidPassword,
    ServiceUnavailable,
    Timeout,
    RateLimited,
    Other(u32),
}

impl ResultCode {
    pub fn is_ok(&self) -> bool {
        matches!(self, ResultCode::Ok)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCode::Ok => f.write_str("OK"),
            ResultCode::Fail => f.write_str("Fail"),
            ResultCode::InvalidPassword => f.write_str("InvalidPassword"),
            ResultCode::ServiceUnavailable => f.write_str("ServiceUnavailable"),
            ResultCode::Timeout => f.write_str("Timeout"),
            ResultCode::RateLimited => f.write_str("RateLimited"),
            ResultCode::Other(code) => write!(f, "Other({})", code),
        }
    }
}

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Second-resolution timestamp since Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Sub for Timestamp {
    type Output = i64;

    fn sub(self, other: Timestamp) -> i64 {
        self.0.saturating_sub(other.0)
    }
}

impl Timestamp {
    pub fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_secs() as i64)
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Time Source Trait
// ----------------------------------------------------------------------------

/// Provides timestamps for persisted rows
///
/// Persistence never reads the clock directly so tests can pin the time.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock implementation of [`TimeSource`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_number_reserved_values() {
        assert_eq!(ChangeNumber::NONE.value(), 0);
        assert_eq!(ChangeNumber::FULL_RUN_SENTINEL.value(), 1);
        assert_eq!(ChangeNumber::FULL_RUN_ISSUED.value(), 2);
        assert!(ChangeNumber::new(10) > ChangeNumber::FULL_RUN_ISSUED);
    }

    #[test]
    fn test_entity_ref_display() {
        assert_eq!(EntityRef::App(AppId(440)).to_string(), "app 440");
        assert_eq!(
            EntityRef::Package(PackageId(29197)).to_string(),
            "package 29197"
        );
        assert_eq!(EntityRef::Package(PackageId(7)).kind(), EntityKind::Package);
    }

    #[test]
    fn test_result_code() {
        assert!(ResultCode::Ok.is_ok());
        assert!(!ResultCode::InvalidPassword.is_ok());
        assert_eq!(ResultCode::Other(42).to_string(), "Other(42)");
    }

    #[test]
    fn test_timestamp_difference() {
        let earlier = Timestamp::from_secs(100);
        let later = Timestamp::from_secs(160);
        assert_eq!(later - earlier, 60);
        assert_eq!(earlier - later, -60);
    }
}
