//! Log-backed notification sink

use picsync_core::Announcer;
use tracing::info;

/// Writes announcements to the `picsync::announce` tracing target
#[derive(Debug, Clone, Default)]
pub struct TracingAnnouncer {
    prefix: Option<String>,
}

impl TracingAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix every announcement, e.g. with the account name
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

impl Announcer for TracingAnnouncer {
    fn announce(&self, message: String) {
        match &self.prefix {
            Some(prefix) => info!(target: "picsync::announce", "{} {}", prefix, message),
            None => info!(target: "picsync::announce", "{}", message),
        }
    }
}
