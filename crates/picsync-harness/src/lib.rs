//! picsync Harness
//!
//! Session simulators and in-memory collaborators for exercising the picsync
//! runtime without a real platform connection or database.
//!
//! - `ScriptedSession`: replays a JSON catalog history; always available
//! - `MockSession` + `MockSessionProbe`: call-recording session driven by
//!   tests (feature `testing`)
//! - recording datastore, collecting announcer, counting processor and a
//!   frozen clock (feature `testing`)

pub mod scripted;

#[cfg(feature = "testing")]
pub mod mock_session;

#[cfg(feature = "testing")]
mod recorders;

pub use scripted::{ScriptCatalog, ScriptError, ScriptedSession, SessionScript};

#[cfg(feature = "testing")]
pub use mock_session::{MockSession, MockSessionConfig, MockSessionProbe, SessionCall};

#[cfg(feature = "testing")]
pub use recorders::{
    CollectingAnnouncer, CountingProcessor, FixedTimeSource, RecordedStatement,
    RecordingDatastore,
};
