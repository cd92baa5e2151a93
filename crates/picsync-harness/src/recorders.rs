//! Recording collaborators
//!
//! In-memory stand-ins for the datastore, the notification sink, the entity
//! processor and the clock. Each keeps what it was given so tests can assert
//! on it afterwards.

use picsync_core::{
    Announcer, AppId, Datastore, DatastoreError, EntityProcessor, EntityRef, ProcessingError,
    ProductInfo, SqlValue, TimeSource, Timestamp,
};
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

// ----------------------------------------------------------------------------
// Recording Datastore
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Datastore that records every statement instead of running it
#[derive(Debug, Default)]
pub struct RecordingDatastore {
    statements: Mutex<Vec<RecordedStatement>>,
    latest_change: Mutex<Option<u32>>,
    fail_matching: Mutex<Option<String>>,
    fail_queries: AtomicBool,
}

impl RecordingDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value returned by the latest-changelist query
    pub fn set_latest_change(&self, latest: Option<u32>) {
        if let Ok(mut slot) = self.latest_change.lock() {
            *slot = latest;
        }
    }

    /// Fail every statement whose SQL contains `fragment`
    pub fn fail_statements_matching(&self, fragment: &str) {
        if let Ok(mut slot) = self.fail_matching.lock() {
            *slot = Some(fragment.to_string());
        }
    }

    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Every statement attempted so far, oldest first
    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.statements
            .lock()
            .map(|statements| statements.clone())
            .unwrap_or_default()
    }

    /// Statements whose SQL is exactly `sql`
    pub fn statements_matching(&self, sql: &str) -> Vec<RecordedStatement> {
        self.statements()
            .into_iter()
            .filter(|statement| statement.sql == sql)
            .collect()
    }

    pub fn statement_count(&self) -> usize {
        self.statements.lock().map(|s| s.len()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Datastore for RecordingDatastore {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, DatastoreError> {
        if let Ok(mut statements) = self.statements.lock() {
            statements.push(RecordedStatement {
                sql: sql.to_string(),
                params: params.to_vec(),
            });
        }

        let failing = self
            .fail_matching
            .lock()
            .ok()
            .and_then(|fragment| fragment.clone())
            .map_or(false, |fragment| sql.contains(&fragment));
        if failing {
            return Err(DatastoreError::statement("injected failure"));
        }
        Ok(1)
    }

    async fn query_u32(&self, _sql: &str) -> Result<Option<u32>, DatastoreError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(DatastoreError::Unavailable {
                reason: "injected failure".to_string(),
            });
        }
        Ok(self.latest_change.lock().ok().and_then(|latest| *latest))
    }
}

// ----------------------------------------------------------------------------
// Collecting Announcer
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CollectingAnnouncer {
    messages: Mutex<Vec<String>>,
}

impl CollectingAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    /// Whether any announcement contains `fragment`
    pub fn contains(&self, fragment: &str) -> bool {
        self.messages().iter().any(|m| m.contains(fragment))
    }
}

impl Announcer for CollectingAnnouncer {
    fn announce(&self, message: String) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
    }
}

// ----------------------------------------------------------------------------
// Counting Processor
// ----------------------------------------------------------------------------

/// Entity processor that records what it saw and tracks concurrency
#[derive(Debug, Default)]
pub struct CountingProcessor {
    processed: Mutex<Vec<EntityRef>>,
    unknown: Mutex<Vec<AppId>>,
    failing: HashSet<EntityRef>,
    panicking: HashSet<EntityRef>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl CountingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return an error when processing `entity`
    pub fn failing_on(mut self, entity: EntityRef) -> Self {
        self.failing.insert(entity);
        self
    }

    /// Panic when processing `entity`
    pub fn panicking_on(mut self, entity: EntityRef) -> Self {
        self.panicking.insert(entity);
        self
    }

    /// Entities processed successfully
    pub fn processed(&self) -> Vec<EntityRef> {
        self.processed
            .lock()
            .map(|processed| processed.clone())
            .unwrap_or_default()
    }

    /// Unknown apps handed to `process_unknown`
    pub fn unknown(&self) -> Vec<AppId> {
        self.unknown
            .lock()
            .map(|unknown| unknown.clone())
            .unwrap_or_default()
    }

    /// Highest number of `process` calls observed running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EntityProcessor for CountingProcessor {
    async fn process(&self, entity: EntityRef, _info: ProductInfo) -> Result<(), ProcessingError> {
        if self.panicking.contains(&entity) {
            panic!("processor panicked on {}", entity);
        }

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&entity) {
            return Err(ProcessingError::Failed {
                entity,
                reason: "injected failure".to_string(),
            });
        }

        if let Ok(mut processed) = self.processed.lock() {
            processed.push(entity);
        }
        Ok(())
    }

    async fn process_unknown(&self, app: AppId) -> Result<(), ProcessingError> {
        if let Ok(mut unknown) = self.unknown.lock() {
            unknown.push(app);
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Fixed Time Source
// ----------------------------------------------------------------------------

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource(pub Timestamp);

impl TimeSource for FixedTimeSource {
    fn now(&self) -> Timestamp {
        self.0
    }
}
