//! Shared setup for runtime integration tests

#![allow(dead_code)]

use picsync_core::{Credentials, FullRun, SyncConfig, Timestamp};
use picsync_harness::{
    CollectingAnnouncer, CountingProcessor, FixedTimeSource, MockSession, MockSessionConfig,
    MockSessionProbe, RecordingDatastore,
};
use picsync_runtime::{RuntimeBuilder, RuntimeHandle};
use std::{sync::Arc, time::Duration};

pub struct TestRuntime {
    pub handle: RuntimeHandle,
    pub probe: MockSessionProbe,
    pub datastore: Arc<RecordingDatastore>,
    pub announcer: Arc<CollectingAnnouncer>,
    pub processor: Arc<CountingProcessor>,
}

pub struct TestSetup {
    pub full_run: FullRun,
    pub session: MockSessionConfig,
    pub latest_change: Option<u32>,
    pub processor: CountingProcessor,
}

impl Default for TestSetup {
    fn default() -> Self {
        Self {
            full_run: FullRun::Disabled,
            session: MockSessionConfig::default(),
            latest_change: Some(100),
            processor: CountingProcessor::new(),
        }
    }
}

impl TestSetup {
    pub async fn start(self) -> TestRuntime {
        let (session, probe) = MockSession::new(self.session);
        let datastore = Arc::new(RecordingDatastore::new());
        datastore.set_latest_change(self.latest_change);
        let announcer = Arc::new(CollectingAnnouncer::new());
        let processor = Arc::new(self.processor);

        let mut config = SyncConfig::new(self.full_run, Credentials::new("mirror", "hunter2"));
        config.channels = picsync_core::config::ChannelConfig::testing();

        let handle = RuntimeBuilder::new(config)
            .with_session(session)
            .with_datastore(datastore.clone())
            .with_announcer(announcer.clone())
            .with_processor(processor.clone())
            .with_time_source(Arc::new(FixedTimeSource(Timestamp::from_secs(1_365_000_000))))
            .build_and_start()
            .await
            .expect("runtime should start");

        let runtime = TestRuntime {
            handle,
            probe,
            datastore,
            announcer,
            processor,
        };
        settle().await;
        runtime
    }
}

/// Let every ready task run; with a paused clock this advances 10ms
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}
