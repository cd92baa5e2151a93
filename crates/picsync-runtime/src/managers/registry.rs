//! Job correlation registry
//!
//! Maps outstanding product-info jobs issued on behalf of an external caller
//! to the caller's context, so the reply can be routed back to it instead of
//! the bulk pipeline.

use dashmap::{mapref::entry::Entry, DashMap};
use picsync_core::{
    channel::LookupReplySender, JobId, LookupError, ProductInfoReply, RegistryError,
};
use tokio::time::Instant;
use tracing::{debug, warn};

// ----------------------------------------------------------------------------
// Job Registry
// ----------------------------------------------------------------------------

/// Pending requests keyed by job id
///
/// `resolve` is an atomic find-and-remove, so a reply can be claimed at most
/// once even when replies are handled from several tasks.
#[derive(Debug)]
pub struct JobRegistry<C> {
    pending: DashMap<JobId, C>,
}

impl<C> JobRegistry<C> {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// Register a pending request; a job id that is already present is
    /// rejected and the existing entry is kept
    pub fn register(&self, job: JobId, context: C) -> Result<(), RegistryError> {
        match self.pending.entry(job) {
            Entry::Occupied(_) => {
                warn!("Job {} is already pending, refusing duplicate registration", job);
                Err(RegistryError::DuplicateJob { job })
            }
            Entry::Vacant(slot) => {
                slot.insert(context);
                debug!("Registered pending {}", job);
                Ok(())
            }
        }
    }

    /// Claim the entry for `job`, if any
    pub fn resolve(&self, job: JobId) -> Option<C> {
        self.pending.remove(&job).map(|(_, context)| context)
    }

    /// Remove every pending entry because the issuing session went away
    ///
    /// Returns the removed contexts. Replies that still arrive for these jobs
    /// are treated as unmatched.
    pub fn orphan_all(&self) -> Vec<C> {
        let jobs: Vec<JobId> = self.pending.iter().map(|entry| *entry.key()).collect();
        jobs.into_iter()
            .filter_map(|job| self.pending.remove(&job).map(|(_, context)| context))
            .collect()
    }

    pub fn contains(&self, job: JobId) -> bool {
        self.pending.contains_key(&job)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<C> Default for JobRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Pending Lookup
// ----------------------------------------------------------------------------

/// Context of an interactive product-info lookup
#[derive(Debug)]
pub struct PendingLookup {
    pub requester: String,
    pub issued_at: Instant,
    reply: LookupReplySender,
}

impl PendingLookup {
    pub fn new(requester: impl Into<String>, reply: LookupReplySender) -> Self {
        Self {
            requester: requester.into(),
            issued_at: Instant::now(),
            reply,
        }
    }

    /// Hand the reply to the requester; a requester that stopped waiting is
    /// not an error
    pub fn deliver(self, reply: ProductInfoReply) {
        debug!(
            "Delivering product info to {} after {:?}",
            self.requester,
            self.issued_at.elapsed()
        );
        if self.reply.send(Ok(reply)).is_err() {
            debug!("Requester {} is no longer waiting", self.requester);
        }
    }

    /// Report that no reply will come
    pub fn fail(self, error: LookupError) {
        debug!("Lookup for {} failed: {}", self.requester, error);
        let _ = self.reply.send(Err(error));
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
