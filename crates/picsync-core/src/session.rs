//! Catalog Session Trait Definition
//!
//! The session layer is an external collaborator: it owns the wire protocol,
//! encryption and authentication against the platform. The controller only
//! drives it through this trait and consumes its `SessionEvent` stream.

use crate::{
    channel::EventSender,
    config::Credentials,
    errors::SessionError,
    types::{AppId, ChangeNumber, JobId, PackageId},
};

// ----------------------------------------------------------------------------
// Catalog Session Trait
// ----------------------------------------------------------------------------

/// Outbound interface of the platform session
///
/// ## Contract
///
/// - Results of `connect`, `log_on` and `disconnect` are reported
///   asynchronously on the attached event channel, never as return values.
///   An `Err` return means the call could not even be issued.
/// - Requests return the `JobId` the eventual reply will carry. Job ids are
///   unique for the lifetime of one connection.
/// - Events must be delivered in the order the session produced them.
#[async_trait::async_trait]
pub trait CatalogSession: Send + Sync {
    /// Attach the channel the session reports events on
    fn attach_events(&mut self, events: EventSender) -> Result<(), SessionError>;

    /// Open a connection; answered by `SessionEvent::Connected`
    async fn connect(&self) -> Result<(), SessionError>;

    /// Authenticate; answered by `SessionEvent::LoggedOn`
    async fn log_on(&self, credentials: &Credentials) -> Result<(), SessionError>;

    /// Close the connection; answered by `SessionEvent::Disconnected`
    async fn disconnect(&self) -> Result<(), SessionError>;

    /// Ask what changed since `since`; answered by `SessionEvent::Changes`
    async fn request_changes_since(
        &self,
        since: ChangeNumber,
        want_app_info: bool,
        want_package_info: bool,
    ) -> Result<JobId, SessionError>;

    /// Ask for metadata; answered by `SessionEvent::ProductInfo`
    async fn request_product_info(
        &self,
        apps: Vec<AppId>,
        packages: Vec<PackageId>,
    ) -> Result<JobId, SessionError>;
}
