//! Runtime Builder API
//!
//! Wires the external collaborators to a session controller, starts it on
//! the tokio runtime and hands back a `RuntimeHandle` for lookups, status and
//! shutdown.

use crate::announce::TracingAnnouncer;
use crate::controller::{ControllerError, ControllerParts, SessionController};
use crate::logic::ControllerStats;
use crate::managers::{
    ChangePersistence, DispatchSnapshot, DispatchStats, JobRegistry, PendingLookup, WorkDispatcher,
};
use picsync_core::{
    channel::{create_command_channel, create_event_channel, CommandSender},
    AppId, Announcer, CatalogSession, Command, Datastore, EntityProcessor, LookupError, PackageId,
    PicsyncError, PicsyncResult, ProductInfoReply, SessionState, SyncConfig, SystemTimeSource,
    TimeSource,
};
use std::sync::Arc;
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
};
use tracing::info;

// ----------------------------------------------------------------------------
// Runtime Builder
// ----------------------------------------------------------------------------

/// Builder for a running picsync controller
pub struct RuntimeBuilder {
    config: SyncConfig,
    session: Option<Box<dyn CatalogSession>>,
    datastore: Option<Arc<dyn Datastore>>,
    processor: Option<Arc<dyn EntityProcessor>>,
    announcer: Arc<dyn Announcer>,
    time_source: Arc<dyn TimeSource>,
}

impl RuntimeBuilder {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            session: None,
            datastore: None,
            processor: None,
            announcer: Arc::new(TracingAnnouncer::new()),
            time_source: Arc::new(SystemTimeSource),
        }
    }

    /// Set the session layer; its event channel is attached at build time
    pub fn with_session<S: CatalogSession + 'static>(mut self, session: S) -> Self {
        self.session = Some(Box::new(session));
        self
    }

    pub fn with_datastore(mut self, datastore: Arc<dyn Datastore>) -> Self {
        self.datastore = Some(datastore);
        self
    }

    pub fn with_processor(mut self, processor: Arc<dyn EntityProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Replace the default log-backed announcer
    pub fn with_announcer(mut self, announcer: Arc<dyn Announcer>) -> Self {
        self.announcer = announcer;
        self
    }

    /// Clock used for changelist and last-updated timestamps
    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    /// Build and start the runtime
    pub async fn build_and_start(self) -> PicsyncResult<RuntimeHandle> {
        let mut session = self
            .session
            .ok_or_else(|| PicsyncError::config_error("No session layer configured"))?;
        let datastore = self
            .datastore
            .ok_or_else(|| PicsyncError::config_error("No datastore configured"))?;
        let processor = self
            .processor
            .ok_or_else(|| PicsyncError::config_error("No entity processor configured"))?;
        if self.config.workers.max_workers == 0 {
            return Err(PicsyncError::config_error("Worker pool needs at least one worker"));
        }

        info!("Building picsync runtime");

        let (event_sender, event_receiver) = create_event_channel(&self.config.channels);
        let (command_sender, command_receiver) = create_command_channel(&self.config.channels);
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);

        session.attach_events(event_sender)?;

        let registry = Arc::new(JobRegistry::new());
        let dispatcher = WorkDispatcher::new(processor, &self.config.workers);
        let dispatch_stats = dispatcher.stats();

        let parts = ControllerParts {
            session: Arc::from(session),
            events: event_receiver,
            commands: command_receiver,
            registry: registry.clone(),
            persistence: Arc::new(ChangePersistence::new(datastore, self.time_source)),
            dispatcher,
            announcer: self.announcer,
            state_tx,
        };
        let controller = SessionController::new(self.config, parts);
        let controller_handle = tokio::spawn(controller.run());

        info!("picsync runtime started");

        Ok(RuntimeHandle {
            command_sender,
            state_rx,
            registry,
            dispatch_stats,
            controller_handle: Some(controller_handle),
        })
    }
}

// ----------------------------------------------------------------------------
// Runtime Handle
// ----------------------------------------------------------------------------

/// Handle to a running controller
pub struct RuntimeHandle {
    command_sender: CommandSender,
    state_rx: watch::Receiver<SessionState>,
    registry: Arc<JobRegistry<PendingLookup>>,
    dispatch_stats: Arc<DispatchStats>,
    controller_handle: Option<JoinHandle<Result<ControllerStats, ControllerError>>>,
}

impl RuntimeHandle {
    pub fn session_state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Wait until the session reaches `state`
    pub async fn wait_for_state(&mut self, state: SessionState) -> PicsyncResult<()> {
        self.state_rx
            .wait_for(|current| *current == state)
            .await
            .map(|_| ())
            .map_err(|_| PicsyncError::channel_error("Controller stopped"))
    }

    pub fn pending_lookups(&self) -> usize {
        self.registry.len()
    }

    pub fn dispatch_stats(&self) -> DispatchSnapshot {
        self.dispatch_stats.snapshot()
    }

    /// Wait until every dispatched unit of work has finished
    pub async fn wait_for_workers(&self) {
        self.dispatch_stats.wait_idle().await;
    }

    /// Fetch product info for an external requester
    ///
    /// The reply is delivered here only and never runs through the entity
    /// processor.
    pub async fn lookup_product_info(
        &self,
        requester: impl Into<String>,
        apps: Vec<AppId>,
        packages: Vec<PackageId>,
    ) -> Result<ProductInfoReply, LookupError> {
        let (reply, receiver) = oneshot::channel();
        let command = Command::LookupProductInfo {
            requester: requester.into(),
            apps,
            packages,
            reply,
        };
        self.command_sender
            .send(command)
            .await
            .map_err(|_| LookupError::ControllerStopped)?;

        receiver.await.map_err(|_| LookupError::Orphaned)?
    }

    /// Ask the controller to stop and wait for it
    pub async fn shutdown(&mut self) -> Result<ControllerStats, ControllerError> {
        info!("Shutting down picsync runtime");
        let _ = self.command_sender.send(Command::Shutdown).await;
        self.wait().await
    }

    /// Wait for the controller to exit on its own
    ///
    /// Cancel safe: dropping the future leaves the controller joinable.
    pub async fn wait(&mut self) -> Result<ControllerStats, ControllerError> {
        let handle = self
            .controller_handle
            .as_mut()
            .ok_or_else(|| ControllerError::Aborted {
                reason: "controller already joined".to_string(),
            })?;

        let joined = handle.await;
        self.controller_handle = None;
        joined.map_err(|e| ControllerError::Aborted {
            reason: e.to_string(),
        })?
    }
}
