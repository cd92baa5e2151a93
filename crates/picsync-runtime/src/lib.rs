//! picsync Runtime Engine
//!
//! This crate drives the catalog mirror:
//! - `SessionController`: the connect/logon/reconnect loop and changelist poller
//! - `JobRegistry`: routes product-info replies back to interactive requesters
//! - `ChangePersistence`: idempotent changelist bookkeeping in the datastore
//! - `WorkDispatcher`: bounded fan-out of changed entities to the processor
//!
//! `picsync-core` provides the types and collaborator interfaces; this crate
//! orchestrates them.

pub mod announce;
pub mod builder;
pub mod controller;
pub mod logic;
pub mod managers;

pub use announce::TracingAnnouncer;
pub use builder::{RuntimeBuilder, RuntimeHandle};
pub use controller::{ControllerError, ControllerParts, SessionController, DISCONNECT_GRACE};
pub use logic::{ControllerStats, DiffDecision, PollerState};
pub use managers::*;

// Re-export core types for convenience
pub use picsync_core::{
    AppId, ChangeNumber, ChangelistDiff, FullRun, JobId, LookupError, PackageId, PicsyncError,
    PicsyncResult, ProductInfo, ProductInfoReply, SessionEvent, SessionState, SyncConfig,
};
