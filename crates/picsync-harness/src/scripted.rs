//! Scripted Session
//!
//! A self-contained `CatalogSession` that replays a catalog history loaded
//! from JSON. It answers every call immediately, which makes it usable both
//! as the simulator backend of the `picsync` binary and in end-to-end tests.
//!
//! ```json
//! {
//!   "server_time": "2013-04-01 12:00:00",
//!   "changelists": [
//!     { "current_change_number": 101, "app_changes": { "440": 101 } }
//!   ],
//!   "catalog": {
//!     "apps": { "440": { "change_number": 101, "payload": { "name": "Team Fortress 2" } } }
//!   }
//! }
//! ```

use picsync_core::{
    channel::{EventSender, NonBlockingSend},
    AppId, CatalogSession, ChangeNumber, ChangelistDiff, Credentials, JobId, PackageId,
    ProductInfo, ProductInfoReply, ResultCode, SessionError, SessionEvent,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};
use tracing::{debug, info};

// ----------------------------------------------------------------------------
// Script Format
// ----------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Failed to read script: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid script: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Changelists must be strictly increasing, {next} follows {previous}")]
    OutOfOrder {
        previous: ChangeNumber,
        next: ChangeNumber,
    },
}

/// Metadata the scripted platform knows about
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptCatalog {
    #[serde(default)]
    pub apps: BTreeMap<AppId, ProductInfo>,
    #[serde(default)]
    pub packages: BTreeMap<PackageId, ProductInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionScript {
    #[serde(default = "default_server_time")]
    pub server_time: String,
    /// Changelists in the order the platform publishes them
    #[serde(default)]
    pub changelists: Vec<ChangelistDiff>,
    #[serde(default)]
    pub catalog: ScriptCatalog,
}

fn default_server_time() -> String {
    "1970-01-01 00:00:00".to_string()
}

impl SessionScript {
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let script: Self = serde_json::from_str(json)?;
        script.validate()?;
        Ok(script)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<(), ScriptError> {
        for pair in self.changelists.windows(2) {
            let (previous, next) = (pair[0].current_change_number, pair[1].current_change_number);
            if next <= previous {
                return Err(ScriptError::OutOfOrder { previous, next });
            }
        }
        Ok(())
    }

    /// Diff answering "what changed since `since`"
    ///
    /// The full-run sentinel yields every catalog entity at the newest change
    /// number. Otherwise the first scripted changelist newer than `since` is
    /// returned, or an empty diff at `since` when nothing newer exists.
    pub fn changes_since(&self, since: ChangeNumber) -> ChangelistDiff {
        if since == ChangeNumber::FULL_RUN_SENTINEL {
            let newest = self.newest_change_number();
            let mut diff = ChangelistDiff::new(newest);
            for (app, info) in &self.catalog.apps {
                diff = diff.with_app(*app, info.change_number);
            }
            for (package, info) in &self.catalog.packages {
                diff = diff.with_package(*package, info.change_number);
            }
            return diff;
        }

        self.changelists
            .iter()
            .find(|diff| diff.current_change_number > since)
            .cloned()
            .unwrap_or_else(|| ChangelistDiff::new(since))
    }

    /// Reply naming every requested entity, unknown ones included
    pub fn product_info(&self, apps: &[AppId], packages: &[PackageId]) -> ProductInfoReply {
        let mut reply = ProductInfoReply::default();
        for app in apps {
            match self.catalog.apps.get(app) {
                Some(info) => {
                    reply.apps.insert(*app, info.clone());
                }
                None => reply.unknown_apps.push(*app),
            }
        }
        for package in packages {
            match self.catalog.packages.get(package) {
                Some(info) => {
                    reply.packages.insert(*package, info.clone());
                }
                None => reply.unknown_packages.push(*package),
            }
        }
        reply
    }

    fn newest_change_number(&self) -> ChangeNumber {
        self.changelists
            .last()
            .map(|diff| diff.current_change_number)
            .unwrap_or(ChangeNumber::FULL_RUN_ISSUED)
    }
}

// ----------------------------------------------------------------------------
// Scripted Session
// ----------------------------------------------------------------------------

pub struct ScriptedSession {
    script: SessionScript,
    events: Mutex<Option<EventSender>>,
    next_job: AtomicU64,
}

impl ScriptedSession {
    pub fn new(script: SessionScript) -> Self {
        Self {
            script,
            events: Mutex::new(None),
            next_job: AtomicU64::new(1),
        }
    }

    fn emit(&self, event: SessionEvent) -> Result<(), SessionError> {
        let sender = self
            .events
            .lock()
            .ok()
            .and_then(|events| events.clone())
            .ok_or(SessionError::NotConnected)?;
        sender
            .send_non_blocking(event)
            .map_err(|e| SessionError::RequestRejected {
                reason: e.to_string(),
            })
    }

    fn next_job(&self) -> JobId {
        JobId(self.next_job.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait::async_trait]
impl CatalogSession for ScriptedSession {
    fn attach_events(&mut self, events: EventSender) -> Result<(), SessionError> {
        let mut slot = self
            .events
            .lock()
            .map_err(|_| SessionError::EventStreamClosed)?;
        *slot = Some(events);
        Ok(())
    }

    async fn connect(&self) -> Result<(), SessionError> {
        info!("Scripted session connecting");
        self.emit(SessionEvent::Connected {
            result: ResultCode::Ok,
        })
    }

    async fn log_on(&self, credentials: &Credentials) -> Result<(), SessionError> {
        info!("Scripted session logging on as {}", credentials.username);
        self.emit(SessionEvent::LoggedOn {
            result: ResultCode::Ok,
            server_time: self.script.server_time.clone(),
        })
    }

    async fn disconnect(&self) -> Result<(), SessionError> {
        self.emit(SessionEvent::Disconnected)
    }

    async fn request_changes_since(
        &self,
        since: ChangeNumber,
        _want_app_info: bool,
        _want_package_info: bool,
    ) -> Result<JobId, SessionError> {
        let job = self.next_job();
        let diff = self.script.changes_since(since);
        debug!(
            "Scripted {} answers changes since {} with {}",
            job, since, diff.current_change_number
        );
        self.emit(SessionEvent::Changes { job, diff })?;
        Ok(job)
    }

    async fn request_product_info(
        &self,
        apps: Vec<AppId>,
        packages: Vec<PackageId>,
    ) -> Result<JobId, SessionError> {
        let job = self.next_job();
        let reply = self.script.product_info(&apps, &packages);
        self.emit(SessionEvent::ProductInfo { job, reply })?;
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"{
        "server_time": "2013-04-01 12:00:00",
        "changelists": [
            { "current_change_number": 101, "app_changes": { "440": 101 } },
            { "current_change_number": 105, "package_changes": { "7": 104 } }
        ],
        "catalog": {
            "apps": { "440": { "change_number": 101, "payload": { "name": "Team Fortress 2" } } },
            "packages": { "7": { "change_number": 104 } }
        }
    }"#;

    #[test]
    fn test_changes_since_walks_history() {
        let script = SessionScript::from_json(SCRIPT).unwrap();

        assert_eq!(
            script.changes_since(ChangeNumber::NONE).current_change_number,
            ChangeNumber::new(101)
        );
        let second = script.changes_since(ChangeNumber::new(101));
        assert_eq!(second.current_change_number, ChangeNumber::new(105));
        assert_eq!(second.package_ids(), vec![PackageId(7)]);

        let idle = script.changes_since(ChangeNumber::new(105));
        assert!(idle.is_empty());
        assert_eq!(idle.current_change_number, ChangeNumber::new(105));
    }

    #[test]
    fn test_full_run_names_whole_catalog() {
        let script = SessionScript::from_json(SCRIPT).unwrap();
        let diff = script.changes_since(ChangeNumber::FULL_RUN_SENTINEL);
        assert_eq!(diff.current_change_number, ChangeNumber::new(105));
        assert_eq!(diff.app_ids(), vec![AppId(440)]);
        assert_eq!(diff.package_ids(), vec![PackageId(7)]);
    }

    #[test]
    fn test_product_info_reports_unknown_entities() {
        let script = SessionScript::from_json(SCRIPT).unwrap();
        let reply = script.product_info(&[AppId(440), AppId(1)], &[PackageId(9)]);
        assert_eq!(reply.apps.len(), 1);
        assert_eq!(reply.unknown_apps, vec![AppId(1)]);
        assert_eq!(reply.unknown_packages, vec![PackageId(9)]);
    }

    #[test]
    fn test_out_of_order_script_is_rejected() {
        let json = r#"{ "changelists": [
            { "current_change_number": 9 },
            { "current_change_number": 8 }
        ] }"#;
        assert!(matches!(
            SessionScript::from_json(json),
            Err(ScriptError::OutOfOrder { .. })
        ));
    }
}
