//! Work dispatcher
//!
//! Fans product-info replies out to the entity processor, one unit of work
//! per entity, bounded by a semaphore. A failing or panicking unit is logged
//! and dropped; it never affects its siblings or the controller.

use futures::FutureExt;
use picsync_core::{
    config::WorkerPoolConfig, AppId, EntityProcessor, EntityRef, FullRun, ProductInfo,
    ProductInfoReply,
};
use serde::Serialize;
use std::{
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, warn};

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

/// Live counters shared by every unit of work
#[derive(Debug, Default)]
pub struct DispatchStats {
    dispatched: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    panicked: AtomicUsize,
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Point-in-time copy of [`DispatchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSnapshot {
    pub dispatched: usize,
    pub completed: usize,
    pub failed: usize,
    pub panicked: usize,
    pub in_flight: usize,
}

impl DispatchStats {
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            dispatched: self.dispatched.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            panicked: self.panicked.load(Ordering::SeqCst),
            in_flight: self.in_flight.load(Ordering::SeqCst),
        }
    }

    /// Wait until no unit of work is running
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    fn started(&self) {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    fn finished(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Units of work submitted for one reply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub apps: usize,
    pub packages: usize,
    pub unknown_apps: usize,
    /// Unknown apps left out because of the full-run mode
    pub skipped_unknown_apps: usize,
    /// Unknown packages, which are only logged
    pub unhandled_packages: usize,
    /// Unknown packages passed over silently because of the full-run mode
    pub skipped_unknown_packages: usize,
}

impl DispatchSummary {
    pub fn total(&self) -> usize {
        self.apps + self.packages + self.unknown_apps
    }
}

// ----------------------------------------------------------------------------
// Work Dispatcher
// ----------------------------------------------------------------------------

#[derive(Clone)]
pub struct WorkDispatcher {
    processor: Arc<dyn EntityProcessor>,
    permits: Arc<Semaphore>,
    stats: Arc<DispatchStats>,
}

impl WorkDispatcher {
    pub fn new(processor: Arc<dyn EntityProcessor>, config: &WorkerPoolConfig) -> Self {
        Self {
            processor,
            permits: Arc::new(Semaphore::new(config.max_workers.max(1))),
            stats: Arc::new(DispatchStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<DispatchStats> {
        self.stats.clone()
    }

    /// Submit one unit of work per entity in `reply`
    ///
    /// Returns as soon as every unit is spawned; units wait for a worker
    /// permit on their own.
    pub fn dispatch(&self, reply: ProductInfoReply, mode: FullRun) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for (app, info) in reply.apps {
            self.submit_known(EntityRef::App(app), info);
            summary.apps += 1;
        }

        for (package, info) in reply.packages {
            self.submit_known(EntityRef::Package(package), info);
            summary.packages += 1;
        }

        for app in reply.unknown_apps {
            if mode.dispatches_unknown_apps() {
                self.submit_unknown(app);
                summary.unknown_apps += 1;
            } else {
                debug!("Skipping unknown app {} in full-run mode {}", app, mode);
                summary.skipped_unknown_apps += 1;
            }
        }

        for package in reply.unknown_packages {
            if mode.dispatches_unknown_apps() {
                warn!("Unknown package {} not handled", package);
                summary.unhandled_packages += 1;
            } else {
                summary.skipped_unknown_packages += 1;
            }
        }

        debug!("Dispatched {} units of work", summary.total());
        summary
    }

    fn submit_known(&self, entity: EntityRef, info: ProductInfo) {
        let processor = self.processor.clone();
        self.spawn_unit(entity.to_string(), async move {
            processor.process(entity, info).await
        });
    }

    fn submit_unknown(&self, app: AppId) {
        let processor = self.processor.clone();
        self.spawn_unit(format!("unknown app {}", app), async move {
            processor.process_unknown(app).await
        });
    }

    fn spawn_unit<F, E>(&self, label: String, work: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let permits = self.permits.clone();
        let stats = self.stats.clone();
        stats.started();

        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    error!("Worker pool closed before {} could run", label);
                    stats.failed.fetch_add(1, Ordering::SeqCst);
                    stats.finished();
                    return;
                }
            };

            match AssertUnwindSafe(work).catch_unwind().await {
                Ok(Ok(())) => {
                    stats.completed.fetch_add(1, Ordering::SeqCst);
                }
                Ok(Err(e)) => {
                    error!("Processing {} failed: {}", label, e);
                    stats.failed.fetch_add(1, Ordering::SeqCst);
                }
                Err(_) => {
                    error!("Processing {} panicked", label);
                    stats.panicked.fetch_add(1, Ordering::SeqCst);
                }
            }
            stats.finished();
        });
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
