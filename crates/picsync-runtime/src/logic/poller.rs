//! Changelist poll timer
//!
//! A fixed one-second ticker that is armed on logon and disarmed whenever the
//! session goes away. Missed ticks are delayed rather than replayed in a burst.

use picsync_core::{config::POLL_INTERVAL, ChangelistDiff};
use std::future;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

#[derive(Debug, Default)]
pub struct PollTimer {
    interval: Option<Interval>,
}

impl PollTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking; the first tick fires one interval from now
    pub fn arm(&mut self) {
        let mut interval = interval_at(Instant::now() + POLL_INTERVAL, POLL_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    pub fn disarm(&mut self) {
        self.interval = None;
    }

    pub fn is_armed(&self) -> bool {
        self.interval.is_some()
    }

    /// Resolve on the next tick, or never while disarmed
    pub async fn tick(&mut self) -> Instant {
        match self.interval.as_mut() {
            Some(interval) => interval.tick().await,
            None => future::pending().await,
        }
    }
}

/// Announcement text for a newly observed changelist
pub fn changelist_announcement(diff: &ChangelistDiff) -> String {
    let mut message = format!(
        "Changelist {} ({} apps, {} packages)",
        diff.current_change_number,
        diff.app_changes.len(),
        diff.package_changes.len()
    );

    let entities: Vec<String> = diff.entity_changes().map(|c| c.entity.to_string()).collect();
    if !entities.is_empty() {
        message.push_str(": ");
        message.push_str(&entities.join(", "));
    }
    message
}
