//! picsync Core
//!
//! Foundational types for the picsync catalog mirror: identifiers and change
//! numbers, changelist diffs and product-info replies, the session lifecycle
//! state machine, channel message types, and the interfaces of the external
//! collaborators (session layer, datastore, notification sink, per-entity
//! processor).
//!
//! The orchestration itself lives in `picsync-runtime`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod announce;
pub mod changelist;
pub mod channel;
pub mod config;
pub mod datastore;
pub mod errors;
pub mod processor;
pub mod protocol;
pub mod session;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use announce::Announcer;
pub use changelist::{ChangelistDiff, EntityChange, ProductInfo, ProductInfoReply};
pub use channel::{Command, LookupError, SessionEvent};
pub use config::{Credentials, FullRun, SyncConfig};
pub use datastore::{Datastore, SqlValue};
pub use errors::{
    DatastoreError, PicsyncError, PicsyncResult, ProcessingError, RegistryError, SessionError,
};
pub use processor::EntityProcessor;
pub use protocol::{SessionState, SessionTrigger, StateTransitionError};
pub use session::CatalogSession;
pub use types::{
    AppId, ChangeNumber, EntityKind, EntityRef, JobId, PackageId, ResultCode, SystemTimeSource,
    TimeSource, Timestamp,
};
