//! Poller state and controller statistics
//!
//! The baseline change number and the full-run latch live here, owned by the
//! controller task alone.

use picsync_core::{ChangeNumber, ChangelistDiff, FullRun};
use serde::Serialize;
use tracing::{debug, info, warn};

// ----------------------------------------------------------------------------
// Diff Decision
// ----------------------------------------------------------------------------

/// What the controller should do with a freshly received diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffDecision {
    /// First diff of a full run: request info for everything it names
    FullRunRequest,
    /// Full run already issued; the diff is dropped
    FullRunIgnored,
    /// Nothing changed since the baseline
    Unchanged,
    /// New changelist; persist, announce and request info
    Incremental { previous: ChangeNumber },
}

// ----------------------------------------------------------------------------
// Poller State
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PollerState {
    baseline: ChangeNumber,
    full_run_started: bool,
}

impl PollerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn baseline(&self) -> ChangeNumber {
        self.baseline
    }

    pub fn set_baseline(&mut self, baseline: ChangeNumber) {
        self.baseline = baseline;
    }

    /// Latch full-run mode and reset the baseline to the sentinel
    ///
    /// Returns false when a full run was already started during this process.
    pub fn begin_full_run(&mut self) -> bool {
        if self.full_run_started {
            return false;
        }
        self.full_run_started = true;
        self.baseline = ChangeNumber::FULL_RUN_SENTINEL;
        true
    }

    /// Apply `diff` to the baseline and decide how to handle it
    pub fn on_diff(&mut self, diff: &ChangelistDiff, mode: FullRun) -> DiffDecision {
        let current = diff.current_change_number;

        if mode.is_enabled() {
            if self.baseline != ChangeNumber::FULL_RUN_SENTINEL {
                warn!(
                    "Got changelist {}, but ignoring it because we're in a full run",
                    current
                );
                return DiffDecision::FullRunIgnored;
            }
            self.baseline = ChangeNumber::FULL_RUN_ISSUED;
            info!(
                "Requesting info for {} apps and {} packages",
                diff.app_changes.len(),
                diff.package_changes.len()
            );
            return DiffDecision::FullRunRequest;
        }

        if current == self.baseline {
            debug!("Changelist {} already processed", current);
            return DiffDecision::Unchanged;
        }

        let previous = self.baseline;
        self.baseline = current;
        DiffDecision::Incremental { previous }
    }
}

// ----------------------------------------------------------------------------
// Controller Statistics
// ----------------------------------------------------------------------------

/// Counters reported by the controller when its loop exits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ControllerStats {
    pub connect_attempts: u64,
    pub logons: u64,
    pub disconnects: u64,
    pub polls: u64,
    pub diffs_processed: u64,
    pub diffs_discarded: u64,
    pub bulk_replies: u64,
    pub lookups_served: u64,
    pub orphaned_lookups: u64,
    pub invalid_transitions: u64,
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use picsync_core::AppId;

    fn diff(current: u32) -> ChangelistDiff {
        ChangelistDiff::new(ChangeNumber::new(current))
    }

    #[test]
    fn test_incremental_advances_baseline() {
        let mut state = PollerState::new();
        state.set_baseline(ChangeNumber::new(100));

        assert_eq!(
            state.on_diff(&diff(105), FullRun::Disabled),
            DiffDecision::Incremental {
                previous: ChangeNumber::new(100)
            }
        );
        assert_eq!(state.baseline(), ChangeNumber::new(105));
    }

    #[test]
    fn test_repeated_diff_is_unchanged() {
        let mut state = PollerState::new();
        state.set_baseline(ChangeNumber::new(100));

        for _ in 0..3 {
            assert_eq!(
                state.on_diff(&diff(100), FullRun::Disabled),
                DiffDecision::Unchanged
            );
        }
        assert_eq!(state.baseline(), ChangeNumber::new(100));
    }

    #[test]
    fn test_full_run_latch() {
        let mut state = PollerState::new();
        assert!(state.begin_full_run());
        assert!(!state.begin_full_run());
        assert_eq!(state.baseline(), ChangeNumber::FULL_RUN_SENTINEL);

        let first = diff(900).with_app(AppId(1), ChangeNumber::new(900));
        assert_eq!(
            state.on_diff(&first, FullRun::KnownOnly),
            DiffDecision::FullRunRequest
        );
        assert_eq!(state.baseline(), ChangeNumber::FULL_RUN_ISSUED);

        assert_eq!(
            state.on_diff(&diff(901), FullRun::KnownOnly),
            DiffDecision::FullRunIgnored
        );
        assert_eq!(state.baseline(), ChangeNumber::FULL_RUN_ISSUED);
    }
}
