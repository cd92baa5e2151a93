//! Command handlers for the picsync CLI

use picsync_core::{Announcer, Datastore};
use picsync_harness::{ScriptedSession, SessionScript};
use picsync_runtime::{
    managers::persistence::LATEST_CHANGELIST_SQL, ControllerStats, RuntimeBuilder,
    TracingAnnouncer,
};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cli::Commands;
use crate::config::AppConfig;
use crate::error::Result;
use crate::processor::StoringProcessor;
use crate::store::SqliteStore;

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(command: Commands, config: AppConfig) -> Result<()> {
        match command {
            Commands::Run { script } => Self::handle_run_command(&script, config).await,
            Commands::InitDb => Self::handle_init_db_command(config).await,
            Commands::Status => Self::handle_status_command(config).await,
        }
    }

    /// Mirror a scripted catalog until it fails or Ctrl-C arrives
    async fn handle_run_command(script_path: &Path, config: AppConfig) -> Result<()> {
        config.validate()?;

        let script = SessionScript::load(script_path)?;
        info!(
            "Loaded session script {} with {} changelists",
            script_path.display(),
            script.changelists.len()
        );

        let store = SqliteStore::connect(&config.database).await?;
        store.migrate().await?;

        let interrupt = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Interrupt received");
        };

        run_session(&config, store, script, interrupt).await?;
        Ok(())
    }

    async fn handle_init_db_command(config: AppConfig) -> Result<()> {
        let store = SqliteStore::connect(&config.database).await?;
        store.migrate().await?;
        println!("Database ready at {}", config.database.url);
        Ok(())
    }

    async fn handle_status_command(config: AppConfig) -> Result<()> {
        let store = SqliteStore::connect(&config.database).await?;
        store.migrate().await?;

        match store.query_u32(LATEST_CHANGELIST_SQL).await? {
            Some(change) => println!("Latest changelist: {}", change),
            None => println!("No changelists recorded yet"),
        }
        Ok(())
    }
}

/// Run the controller against a scripted session until it exits or `stop`
/// completes, then shut it down and drain the workers
pub async fn run_session<F>(
    config: &AppConfig,
    store: SqliteStore,
    script: SessionScript,
    stop: F,
) -> Result<ControllerStats>
where
    F: Future<Output = ()>,
{
    let store = Arc::new(store);
    let announcer: Arc<dyn Announcer> = match &config.announce.prefix {
        Some(prefix) => Arc::new(TracingAnnouncer::with_prefix(prefix.clone())),
        None => Arc::new(TracingAnnouncer::new()),
    };

    let mut handle = RuntimeBuilder::new(config.to_sync_config())
        .with_session(ScriptedSession::new(script))
        .with_datastore(store.clone())
        .with_processor(Arc::new(StoringProcessor::new(store)))
        .with_announcer(announcer)
        .build_and_start()
        .await?;

    tokio::pin!(stop);
    let stats = tokio::select! {
        result = handle.wait() => result?,
        _ = &mut stop => handle.shutdown().await?,
    };
    handle.wait_for_workers().await;

    match serde_json::to_string(&stats) {
        Ok(json) => info!("Controller stopped: {}", json),
        Err(_) => info!("Controller stopped: {:?}", stats),
    }
    Ok(stats)
}
