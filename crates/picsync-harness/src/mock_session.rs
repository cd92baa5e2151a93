//! Mock Session for Testing
//!
//! A deterministic `CatalogSession` that records every call it receives and
//! can answer lifecycle calls on its own. Tests drive everything else through
//! the paired `MockSessionProbe`: injecting events and inspecting calls.

use picsync_core::{
    channel::{EventSender, NonBlockingSend},
    AppId, CatalogSession, ChangeNumber, ChangelistDiff, Credentials, JobId, PackageId,
    ProductInfoReply, ResultCode, SessionError, SessionEvent,
};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};
use tracing::debug;

// ----------------------------------------------------------------------------
// Mock Session Configuration
// ----------------------------------------------------------------------------

/// How the mock answers lifecycle calls
#[derive(Debug, Clone)]
pub struct MockSessionConfig {
    /// Answer `connect()` with this result
    pub auto_connect: Option<ResultCode>,
    /// Answer `log_on()` with this result
    pub auto_logon: Option<ResultCode>,
    /// Answer `disconnect()` with `Disconnected`
    pub auto_disconnect: bool,
    /// Server time reported on logon
    pub server_time: String,
}

impl Default for MockSessionConfig {
    fn default() -> Self {
        Self {
            auto_connect: Some(ResultCode::Ok),
            auto_logon: Some(ResultCode::Ok),
            auto_disconnect: true,
            server_time: "2013-04-01 12:00:00".to_string(),
        }
    }
}

impl MockSessionConfig {
    /// Never answer on its own; every event comes from the probe
    pub fn manual() -> Self {
        Self {
            auto_connect: None,
            auto_logon: None,
            auto_disconnect: false,
            ..Self::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Recorded Calls
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    Connect,
    LogOn {
        username: String,
    },
    Disconnect,
    RequestChanges {
        since: ChangeNumber,
        job: JobId,
    },
    RequestProductInfo {
        apps: Vec<AppId>,
        packages: Vec<PackageId>,
        job: JobId,
    },
}

#[derive(Debug, Default)]
struct Shared {
    events: Mutex<Option<EventSender>>,
    calls: Mutex<Vec<SessionCall>>,
    next_job: AtomicU64,
    reject_requests: AtomicBool,
    reject_connects: AtomicBool,
}

impl Shared {
    fn record(&self, call: SessionCall) {
        debug!("Mock session call: {:?}", call);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn sender(&self) -> Result<EventSender, SessionError> {
        self.events
            .lock()
            .ok()
            .and_then(|events| events.clone())
            .ok_or(SessionError::NotConnected)
    }

    fn emit(&self, event: SessionEvent) -> Result<(), SessionError> {
        self.sender()?
            .send_non_blocking(event)
            .map_err(|e| SessionError::RequestRejected {
                reason: e.to_string(),
            })
    }

    fn next_job(&self) -> Result<JobId, SessionError> {
        if self.reject_requests.load(Ordering::SeqCst) {
            return Err(SessionError::RequestRejected {
                reason: "requests rejected by test".to_string(),
            });
        }
        Ok(JobId(self.next_job.fetch_add(1, Ordering::SeqCst) + 1))
    }
}

// ----------------------------------------------------------------------------
// Mock Session
// ----------------------------------------------------------------------------

pub struct MockSession {
    config: MockSessionConfig,
    shared: Arc<Shared>,
}

impl MockSession {
    pub fn new(config: MockSessionConfig) -> (Self, MockSessionProbe) {
        let shared = Arc::new(Shared::default());
        let probe = MockSessionProbe {
            shared: shared.clone(),
        };
        (Self { config, shared }, probe)
    }
}

#[async_trait::async_trait]
impl CatalogSession for MockSession {
    fn attach_events(&mut self, events: EventSender) -> Result<(), SessionError> {
        let mut slot = self
            .shared
            .events
            .lock()
            .map_err(|_| SessionError::EventStreamClosed)?;
        *slot = Some(events);
        Ok(())
    }

    async fn connect(&self) -> Result<(), SessionError> {
        self.shared.record(SessionCall::Connect);
        if self.shared.reject_connects.load(Ordering::SeqCst) {
            return Err(SessionError::RequestRejected {
                reason: "connect rejected by test".to_string(),
            });
        }
        if let Some(result) = self.config.auto_connect {
            self.shared.emit(SessionEvent::Connected { result })?;
        }
        Ok(())
    }

    async fn log_on(&self, credentials: &Credentials) -> Result<(), SessionError> {
        self.shared.record(SessionCall::LogOn {
            username: credentials.username.clone(),
        });
        if let Some(result) = self.config.auto_logon {
            self.shared.emit(SessionEvent::LoggedOn {
                result,
                server_time: self.config.server_time.clone(),
            })?;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SessionError> {
        self.shared.record(SessionCall::Disconnect);
        if self.config.auto_disconnect {
            self.shared.emit(SessionEvent::Disconnected)?;
        }
        Ok(())
    }

    async fn request_changes_since(
        &self,
        since: ChangeNumber,
        _want_app_info: bool,
        _want_package_info: bool,
    ) -> Result<JobId, SessionError> {
        let job = self.shared.next_job()?;
        self.shared.record(SessionCall::RequestChanges { since, job });
        Ok(job)
    }

    async fn request_product_info(
        &self,
        apps: Vec<AppId>,
        packages: Vec<PackageId>,
    ) -> Result<JobId, SessionError> {
        let job = self.shared.next_job()?;
        self.shared.record(SessionCall::RequestProductInfo {
            apps,
            packages,
            job,
        });
        Ok(job)
    }
}

// ----------------------------------------------------------------------------
// Mock Session Probe
// ----------------------------------------------------------------------------

/// Test-side view of a [`MockSession`]
#[derive(Clone)]
pub struct MockSessionProbe {
    shared: Arc<Shared>,
}

impl MockSessionProbe {
    /// Inject an event as if the session layer produced it
    pub async fn emit(&self, event: SessionEvent) -> Result<(), SessionError> {
        self.shared
            .sender()?
            .send(event)
            .await
            .map_err(|_| SessionError::EventStreamClosed)
    }

    pub async fn emit_changes(&self, job: JobId, diff: ChangelistDiff) -> Result<(), SessionError> {
        self.emit(SessionEvent::Changes { job, diff }).await
    }

    pub async fn emit_product_info(
        &self,
        job: JobId,
        reply: ProductInfoReply,
    ) -> Result<(), SessionError> {
        self.emit(SessionEvent::ProductInfo { job, reply }).await
    }

    /// Make every subsequent request fail to issue
    pub fn reject_requests(&self, reject: bool) {
        self.shared.reject_requests.store(reject, Ordering::SeqCst);
    }

    /// Make every subsequent `connect()` fail to issue
    pub fn reject_connects(&self, reject: bool) {
        self.shared.reject_connects.store(reject, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<SessionCall> {
        self.shared
            .calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn connect_count(&self) -> usize {
        self.count(|call| matches!(call, SessionCall::Connect))
    }

    pub fn logon_count(&self) -> usize {
        self.count(|call| matches!(call, SessionCall::LogOn { .. }))
    }

    pub fn disconnect_count(&self) -> usize {
        self.count(|call| matches!(call, SessionCall::Disconnect))
    }

    /// `(since, job)` of every changes request, oldest first
    pub fn change_requests(&self) -> Vec<(ChangeNumber, JobId)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SessionCall::RequestChanges { since, job } => Some((since, job)),
                _ => None,
            })
            .collect()
    }

    /// `(apps, packages, job)` of every product-info request, oldest first
    pub fn product_info_requests(&self) -> Vec<(Vec<AppId>, Vec<PackageId>, JobId)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SessionCall::RequestProductInfo {
                    apps,
                    packages,
                    job,
                } => Some((apps, packages, job)),
                _ => None,
            })
            .collect()
    }

    fn count(&self, predicate: impl Fn(&SessionCall) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }
}
