//! Stateful managers for the picsync runtime
//!
//! Shared components the session controller delegates to: the job registry,
//! change persistence and the work dispatcher.

pub mod dispatcher;
pub mod persistence;
pub mod registry;

pub use dispatcher::{DispatchSnapshot, DispatchStats, DispatchSummary, WorkDispatcher};
pub use persistence::{ChangePersistence, PersistenceSummary};
pub use registry::{JobRegistry, PendingLookup};
