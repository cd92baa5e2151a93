//! Session protocol state

pub mod session_state;

pub use session_state::{
    AuditEntry, SessionState, SessionTrigger, StateTransition, StateTransitionError,
};
