//! Session Controller
//!
//! The single task that owns the session lifecycle. It drains session events,
//! runtime commands and poll ticks one at a time from a `tokio::select!` loop;
//! persistence, announcements and per-entity work are spawned off the loop so
//! they never hold it up.

use crate::logic::{changelist_announcement, ControllerStats, DiffDecision, PollTimer, PollerState};
use crate::managers::{ChangePersistence, JobRegistry, PendingLookup, WorkDispatcher};
use picsync_core::{
    announce,
    channel::{CommandReceiver, EventReceiver, LookupReplySender},
    config::{LOGON_FAILURE_PAUSE, RECONNECT_DELAY},
    AppId, Announcer, CatalogSession, ChangeNumber, ChangelistDiff, Command, JobId, LookupError,
    PackageId, ProductInfoReply, ResultCode, SessionError, SessionEvent, SessionState,
    SessionTrigger, SyncConfig,
};
use std::{future, sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    time::{sleep, sleep_until, Instant},
};
use tracing::{debug, error, info, warn};

/// How long a shutdown waits for the session layer to confirm the disconnect
pub const DISCONNECT_GRACE: Duration = Duration::from_secs(5);

// ----------------------------------------------------------------------------
// Errors
// ----------------------------------------------------------------------------

/// Fatal outcomes of the controller loop
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Failed to connect: {result}")]
    ConnectFailed { result: ResultCode },

    #[error("Session layer error: {0}")]
    Session(#[from] SessionError),

    #[error("Controller task ended abnormally: {reason}")]
    Aborted { reason: String },
}

/// Whether the loop keeps going after a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

// ----------------------------------------------------------------------------
// Session Controller
// ----------------------------------------------------------------------------

/// Collaborators shared between the controller and the runtime handle
pub struct ControllerParts {
    pub session: Arc<dyn CatalogSession>,
    pub events: EventReceiver,
    pub commands: CommandReceiver,
    pub registry: Arc<JobRegistry<PendingLookup>>,
    pub persistence: Arc<ChangePersistence>,
    pub dispatcher: WorkDispatcher,
    pub announcer: Arc<dyn Announcer>,
    pub state_tx: watch::Sender<SessionState>,
}

pub struct SessionController {
    config: SyncConfig,
    session: Arc<dyn CatalogSession>,
    events: EventReceiver,
    commands: CommandReceiver,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    poller: PollerState,
    poll_timer: PollTimer,
    registry: Arc<JobRegistry<PendingLookup>>,
    persistence: Arc<ChangePersistence>,
    dispatcher: WorkDispatcher,
    announcer: Arc<dyn Announcer>,
    /// Cleared once shutdown was requested
    running: bool,
    shutdown_deadline: Option<Instant>,
    stats: ControllerStats,
}

impl SessionController {
    pub fn new(config: SyncConfig, parts: ControllerParts) -> Self {
        Self {
            config,
            session: parts.session,
            events: parts.events,
            commands: parts.commands,
            state: SessionState::Disconnected,
            state_tx: parts.state_tx,
            poller: PollerState::new(),
            poll_timer: PollTimer::new(),
            registry: parts.registry,
            persistence: parts.persistence,
            dispatcher: parts.dispatcher,
            announcer: parts.announcer,
            running: true,
            shutdown_deadline: None,
            stats: ControllerStats::default(),
        }
    }

    /// Connect and run until shutdown, a fatal connect failure, or the
    /// session event stream closing
    pub async fn run(mut self) -> Result<ControllerStats, ControllerError> {
        info!("Starting session controller (full run: {})", self.config.full_run);
        self.connect().await?;

        loop {
            let flow = tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event).await?,
                    None => {
                        warn!("Session event stream closed");
                        Flow::Exit
                    }
                },
                Some(command) = self.commands.recv() => self.handle_command(command).await,
                _ = self.poll_timer.tick() => {
                    self.poll().await;
                    Flow::Continue
                }
                _ = wait_for_deadline(self.shutdown_deadline) => {
                    warn!("Session did not confirm disconnect within {:?}", DISCONNECT_GRACE);
                    Flow::Exit
                }
            };

            if flow == Flow::Exit {
                break;
            }
        }

        self.poll_timer.disarm();
        let orphaned = self.orphan_lookups();
        if orphaned > 0 {
            info!("Dropped {} pending lookups on exit", orphaned);
        }
        info!("Session controller stopped");
        Ok(self.stats)
    }

    // ------------------------------------------------------------------------
    // Session Events
    // ------------------------------------------------------------------------

    async fn handle_event(&mut self, event: SessionEvent) -> Result<Flow, ControllerError> {
        debug!("Session event: {}", event.name());

        match event {
            SessionEvent::Connected { result } => self.on_connected(result).await,
            SessionEvent::Disconnected => self.on_disconnected().await,
            SessionEvent::LoggedOn {
                result,
                server_time,
            } => {
                self.on_logged_on(result, server_time).await;
                Ok(Flow::Continue)
            }
            SessionEvent::LoggedOff { result } => {
                self.on_logged_off(result);
                Ok(Flow::Continue)
            }
            SessionEvent::Message { kind } => {
                debug!("Ignoring session message {}", kind);
                Ok(Flow::Continue)
            }
            SessionEvent::Changes { job, diff } => {
                self.on_changes(job, diff).await;
                Ok(Flow::Continue)
            }
            SessionEvent::ProductInfo { job, reply } => {
                self.on_product_info(job, reply);
                Ok(Flow::Continue)
            }
        }
    }

    async fn on_connected(&mut self, result: ResultCode) -> Result<Flow, ControllerError> {
        if !result.is_ok() {
            self.apply(SessionTrigger::ConnectFailed { result });
            error!("Failed to connect: {}", result);
            announce!(self.announcer, "failed to connect: {}", result);
            return Err(ControllerError::ConnectFailed { result });
        }

        if !self.apply(SessionTrigger::ConnectSucceeded) {
            return Ok(Flow::Continue);
        }
        if !self.running {
            return Ok(Flow::Continue);
        }

        info!("Connected! Logging in as {}", self.config.credentials.username);
        self.session.log_on(&self.config.credentials).await?;
        Ok(Flow::Continue)
    }

    async fn on_disconnected(&mut self) -> Result<Flow, ControllerError> {
        self.apply(SessionTrigger::ConnectionLost);
        self.poll_timer.disarm();

        let orphaned = self.orphan_lookups();
        if orphaned > 0 {
            warn!("Orphaned {} pending lookups", orphaned);
        }

        if !self.running {
            info!("Disconnected");
            return Ok(Flow::Exit);
        }

        self.stats.disconnects += 1;
        info!(
            "Disconnected. Retrying in {} seconds...",
            RECONNECT_DELAY.as_secs()
        );
        announce!(
            self.announcer,
            "disconnected. Retrying in {} seconds...",
            RECONNECT_DELAY.as_secs()
        );

        if self.wait_reconnect_delay().await == Flow::Exit {
            return Ok(Flow::Exit);
        }

        self.connect().await?;
        Ok(Flow::Continue)
    }

    /// Fail every pending lookup with `Orphaned`
    fn orphan_lookups(&mut self) -> usize {
        let orphaned = self.registry.orphan_all();
        let count = orphaned.len();
        for pending in orphaned {
            pending.fail(LookupError::Orphaned);
        }
        self.stats.orphaned_lookups += count as u64;
        count
    }

    /// Sit out the reconnect delay while still answering commands
    async fn wait_reconnect_delay(&mut self) -> Flow {
        let delay = sleep(RECONNECT_DELAY);
        tokio::pin!(delay);

        loop {
            tokio::select! {
                _ = &mut delay => return Flow::Continue,
                Some(command) = self.commands.recv() => match command {
                    Command::Shutdown => {
                        info!("Shutdown requested during reconnect delay");
                        self.running = false;
                        return Flow::Exit;
                    }
                    Command::LookupProductInfo { reply, .. } => {
                        let _ = reply.send(Err(LookupError::NotLoggedOn));
                    }
                },
            }
        }
    }

    async fn on_logged_on(&mut self, result: ResultCode, server_time: String) {
        if !result.is_ok() {
            self.apply(SessionTrigger::LogonFailed { result });
            error!("Failed to log in: {}", result);
            announce!(self.announcer, "failed to log in: {}", result);
            sleep(LOGON_FAILURE_PAUSE).await;
            return;
        }

        if !self.apply(SessionTrigger::LogonSucceeded) {
            return;
        }
        if !self.running {
            debug!("Logged on while shutting down, not polling");
            return;
        }
        self.stats.logons += 1;
        info!("Logged in, current server time is {} UTC", server_time);
        announce!(self.announcer, "is now logged in. Server time: {} UTC", server_time);

        if self.config.full_run.is_enabled() {
            if self.poller.begin_full_run() {
                info!("Full run: requesting every change since the beginning");
                self.request_changes().await;
            } else {
                debug!("Full run already issued in this process, not polling");
            }
            return;
        }

        self.load_baseline().await;
        self.poll_timer.arm();
    }

    async fn load_baseline(&mut self) {
        match self.persistence.latest_change_number().await {
            Ok(Some(previous)) => {
                info!("Previous changelist was {}", previous);
                self.poller.set_baseline(previous);
            }
            Ok(None) => {
                warn!("Looks like there are no changelists in the database.");
                warn!("If you want to fill up your database first, restart with full_run set to 1.");
                self.poller.set_baseline(ChangeNumber::NONE);
            }
            Err(e) => {
                error!(
                    "Failed to read previous changelist, keeping {}: {}",
                    self.poller.baseline(),
                    e
                );
            }
        }
    }

    fn on_logged_off(&mut self, result: ResultCode) {
        self.apply(SessionTrigger::LoggedOff);
        self.poll_timer.disarm();
        info!("Logged off: {}", result);
        announce!(self.announcer, "logged off.");
    }

    async fn on_changes(&mut self, job: JobId, diff: ChangelistDiff) {
        debug!("Changes reply {} for changelist {}", job, diff.current_change_number);

        match self.poller.on_diff(&diff, self.config.full_run) {
            DiffDecision::FullRunRequest => {
                self.stats.diffs_processed += 1;
                self.request_bulk_info(diff.app_ids(), diff.package_ids()).await;
            }
            DiffDecision::FullRunIgnored | DiffDecision::Unchanged => {
                self.stats.diffs_discarded += 1;
            }
            DiffDecision::Incremental { previous } => {
                self.stats.diffs_processed += 1;
                info!(
                    "Got changelist {}, previous is {} ({} apps, {} packages)",
                    diff.current_change_number,
                    previous,
                    diff.app_changes.len(),
                    diff.package_changes.len()
                );

                let announcer = self.announcer.clone();
                let message = changelist_announcement(&diff);
                tokio::spawn(async move { announcer.announce(message) });

                let persistence = self.persistence.clone();
                let to_persist = diff.clone();
                tokio::spawn(async move {
                    let summary = persistence.persist_diff(&to_persist).await;
                    if !summary.is_clean() {
                        warn!(
                            "Changelist {} persisted with {} failed statements",
                            to_persist.current_change_number, summary.failures
                        );
                    }
                });

                if !diff.is_empty() {
                    self.request_bulk_info(diff.app_ids(), diff.package_ids()).await;
                }
            }
        }
    }

    fn on_product_info(&mut self, job: JobId, reply: ProductInfoReply) {
        match self.registry.resolve(job) {
            Some(pending) => {
                self.stats.lookups_served += 1;
                tokio::spawn(async move { pending.deliver(reply) });
            }
            None => {
                self.stats.bulk_replies += 1;
                let summary = self.dispatcher.dispatch(reply, self.config.full_run);
                debug!("{} dispatched {} units of work", job, summary.total());
            }
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    async fn handle_command(&mut self, command: Command) -> Flow {
        debug!("Controller command: {:?}", command);

        match command {
            Command::LookupProductInfo {
                requester,
                apps,
                packages,
                reply,
            } => {
                self.lookup(requester, apps, packages, reply).await;
                Flow::Continue
            }
            Command::Shutdown => self.begin_shutdown().await,
        }
    }

    /// Issue the request and register its job before any other event is
    /// handled, so the reply cannot slip past the registry
    async fn lookup(
        &mut self,
        requester: String,
        apps: Vec<AppId>,
        packages: Vec<PackageId>,
        reply: LookupReplySender,
    ) {
        if !self.running || !self.state.is_logged_on() {
            let _ = reply.send(Err(LookupError::NotLoggedOn));
            return;
        }

        match self.session.request_product_info(apps, packages).await {
            Ok(job) => {
                debug!("Lookup for {} issued as {}", requester, job);
                // A rejected duplicate drops the context; the requester sees it as orphaned
                let _ = self.registry.register(job, PendingLookup::new(requester, reply));
            }
            Err(e) => {
                warn!("Lookup for {} rejected: {}", requester, e);
                let _ = reply.send(Err(LookupError::Rejected {
                    reason: e.to_string(),
                }));
            }
        }
    }

    async fn begin_shutdown(&mut self) -> Flow {
        info!("Shutting down session controller");
        self.running = false;
        self.poll_timer.disarm();

        if self.state == SessionState::Disconnected {
            return Flow::Exit;
        }

        if let Err(e) = self.session.disconnect().await {
            warn!("Disconnect could not be issued: {}", e);
            return Flow::Exit;
        }
        self.shutdown_deadline = Some(Instant::now() + DISCONNECT_GRACE);
        Flow::Continue
    }

    // ------------------------------------------------------------------------
    // Session Requests
    // ------------------------------------------------------------------------

    async fn connect(&mut self) -> Result<(), ControllerError> {
        self.apply(SessionTrigger::StartConnect);
        self.stats.connect_attempts += 1;
        info!("Connecting...");
        if let Err(e) = self.session.connect().await {
            error!("Connect could not be issued: {}", e);
            announce!(self.announcer, "failed to connect: {}", e);
            return Err(e.into());
        }
        Ok(())
    }

    async fn poll(&mut self) {
        if !self.state.is_logged_on() {
            self.poll_timer.disarm();
            return;
        }
        self.stats.polls += 1;
        self.request_changes().await;
    }

    async fn request_changes(&mut self) {
        let since = self.poller.baseline();
        match self.session.request_changes_since(since, true, true).await {
            Ok(job) => debug!("Requested changes since {} as {}", since, job),
            Err(e) => warn!("Failed to request changes since {}: {}", since, e),
        }
    }

    async fn request_bulk_info(&mut self, apps: Vec<AppId>, packages: Vec<PackageId>) {
        match self.session.request_product_info(apps, packages).await {
            Ok(job) => debug!("Requested product info as {}", job),
            Err(e) => error!("Failed to request product info: {}", e),
        }
    }

    // ------------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------------

    /// Apply a lifecycle trigger; an invalid one is logged and ignored
    fn apply(&mut self, trigger: SessionTrigger) -> bool {
        match self.state.transition(trigger) {
            Ok(transition) => {
                let audit = transition.audit_entry;
                debug!(
                    "Session {} -> {} on {}",
                    audit.from_state, audit.to_state, audit.trigger
                );
                self.state = transition.new_state;
                self.state_tx.send_replace(self.state);
                true
            }
            Err(e) => {
                warn!("{}", e);
                self.stats.invalid_transitions += 1;
                false
            }
        }
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}
