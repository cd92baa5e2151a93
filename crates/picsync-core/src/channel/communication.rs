//! Channel Communication Protocol Types
//!
//! Everything that reaches the session controller flows through one of two
//! channels: `SessionEvent` from the session layer, `Command` from runtime
//! handles.

use crate::changelist::{ChangelistDiff, ProductInfoReply};
use crate::types::{AppId, JobId, PackageId, ResultCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::oneshot;

// ----------------------------------------------------------------------------
// Session Event: Session Layer → Controller
// ----------------------------------------------------------------------------

/// Events delivered by the session layer, in the order it produced them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Outcome of a `connect()` call
    Connected { result: ResultCode },
    /// The underlying connection was closed
    Disconnected,
    /// Outcome of a `log_on()` call
    LoggedOn {
        result: ResultCode,
        /// Platform time at logon, preformatted by the session layer
        server_time: String,
    },
    /// The platform ended the logon
    LoggedOff { result: ResultCode },
    /// Any other platform message; not acted upon
    Message { kind: String },
    /// Reply to `request_changes_since`
    Changes { job: JobId, diff: ChangelistDiff },
    /// Reply to `request_product_info`
    ProductInfo { job: JobId, reply: ProductInfoReply },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Connected { .. } => "Connected",
            SessionEvent::Disconnected => "Disconnected",
            SessionEvent::LoggedOn { .. } => "LoggedOn",
            SessionEvent::LoggedOff { .. } => "LoggedOff",
            SessionEvent::Message { .. } => "Message",
            SessionEvent::Changes { .. } => "Changes",
            SessionEvent::ProductInfo { .. } => "ProductInfo",
        }
    }
}

// ----------------------------------------------------------------------------
// Command: Runtime Handle → Controller
// ----------------------------------------------------------------------------

/// Why an interactive lookup produced no reply
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("Session is not logged on")]
    NotLoggedOn,
    #[error("Request was rejected by the session layer: {reason}")]
    Rejected { reason: String },
    #[error("Session was torn down before the reply arrived")]
    Orphaned,
    #[error("Controller is no longer running")]
    ControllerStopped,
}

/// Reply slot handed to the controller with a lookup
pub type LookupReplySender = oneshot::Sender<Result<ProductInfoReply, LookupError>>;

/// Commands sent to the session controller
pub enum Command {
    /// Fetch product info on behalf of an external requester
    ///
    /// The reply is routed to `reply` only; it is never processed as bulk data.
    LookupProductInfo {
        requester: String,
        apps: Vec<AppId>,
        packages: Vec<PackageId>,
        reply: LookupReplySender,
    },
    /// Stop polling, disconnect and leave the run loop
    Shutdown,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::LookupProductInfo {
                requester,
                apps,
                packages,
                ..
            } => f
                .debug_struct("LookupProductInfo")
                .field("requester", requester)
                .field("apps", apps)
                .field("packages", packages)
                .finish(),
            Command::Shutdown => f.write_str("Shutdown"),
        }
    }
}
