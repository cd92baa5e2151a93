//! Controller logic
//!
//! Pieces of the session controller that hold no I/O of their own:
//! - `state`: poller baseline, full-run latch and controller statistics
//! - `poller`: the poll ticker and changelist announcements

pub mod poller;
pub mod state;

pub use poller::{changelist_announcement, PollTimer};
pub use state::{ControllerStats, DiffDecision, PollerState};
