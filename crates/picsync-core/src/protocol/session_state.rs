//! Session Lifecycle State Machine
//!
//! Consuming state transitions for the platform session. An event that is not
//! valid for the current state is rejected and the caller keeps the old state.

use crate::types::{ResultCode, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

// ----------------------------------------------------------------------------
// Session States
// ----------------------------------------------------------------------------

/// Lifecycle state of the platform session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    LoggedOn,
    LoggedOff,
}

/// Triggers that move the session between states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionTrigger {
    /// `connect()` was issued
    StartConnect,
    /// Session layer accepted the connection
    ConnectSucceeded,
    /// Session layer refused the connection
    ConnectFailed { result: ResultCode },
    /// Logon accepted
    LogonSucceeded,
    /// Logon refused
    LogonFailed { result: ResultCode },
    /// Platform ended the logon
    LoggedOff,
    /// Connection closed, from any state
    ConnectionLost,
}

/// Audit trail entry for one transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: Timestamp,
    pub from_state: SessionState,
    pub to_state: SessionState,
    pub trigger: String,
}

/// Result of a successful transition
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub new_state: SessionState,
    pub audit_entry: AuditEntry,
}

// ----------------------------------------------------------------------------
// State Machine Implementation
// ----------------------------------------------------------------------------

impl SessionState {
    pub fn state_name(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Connecting => "Connecting",
            SessionState::Connected => "Connected",
            SessionState::LoggedOn => "LoggedOn",
            SessionState::LoggedOff => "LoggedOff",
        }
    }

    /// Process a trigger and move to the next state (consumes self)
    pub fn transition(self, trigger: SessionTrigger) -> Result<StateTransition, StateTransitionError> {
        use SessionState::*;

        let new_state = match (self, &trigger) {
            (Disconnected | LoggedOff, SessionTrigger::StartConnect) => Connecting,
            (Connecting, SessionTrigger::ConnectSucceeded) => Connected,
            (Connecting, SessionTrigger::ConnectFailed { .. }) => Disconnected,
            (Connected, SessionTrigger::LogonSucceeded) => LoggedOn,
            (Connected, SessionTrigger::LogonFailed { .. }) => Disconnected,
            (LoggedOn, SessionTrigger::LoggedOff) => LoggedOff,

            // Universal transitions
            (_, SessionTrigger::ConnectionLost) => Disconnected,

            (state, trigger) => {
                return Err(StateTransitionError::InvalidTransition {
                    from_state: state.state_name().to_string(),
                    trigger: format!("{:?}", trigger),
                });
            }
        };

        Ok(StateTransition {
            new_state,
            audit_entry: AuditEntry {
                timestamp: Timestamp::now(),
                from_state: self,
                to_state: new_state,
                trigger: format!("{:?}", trigger),
            },
        })
    }

    /// Whether product-info requests may be issued
    pub fn is_logged_on(&self) -> bool {
        matches!(self, SessionState::LoggedOn)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.state_name())
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors from session state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateTransitionError {
    #[error("Invalid transition from {from_state} on {trigger}")]
    InvalidTransition { from_state: String, trigger: String },
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
