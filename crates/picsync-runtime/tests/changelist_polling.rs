//! Changelist polling integration tests
//!
//! Incremental and full-run diff handling end to end: which statements reach
//! the datastore, which product-info requests reach the session and which
//! entities reach the processor.

mod common;

use common::{advance, settle, TestSetup};
use picsync_core::{
    AppId, ChangeNumber, ChangelistDiff, EntityRef, FullRun, JobId, PackageId, ProductInfo,
    ProductInfoReply, SessionEvent, SqlValue,
};
use picsync_runtime::managers::persistence::{INSERT_APP_TOUCH_SQL, UPSERT_CURRENT_CHANGELIST_SQL};
use std::time::Duration;

fn info(change: u32) -> ProductInfo {
    ProductInfo::new(ChangeNumber::new(change), serde_json::json!({ "common": {} }))
}

// ----------------------------------------------------------------------------
// Incremental Mode
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_repeated_changelist_is_ignored() {
    let runtime = TestSetup::default().start().await;

    for _ in 0..3 {
        runtime
            .probe
            .emit_changes(JobId(900), ChangelistDiff::new(ChangeNumber::new(100)))
            .await
            .unwrap();
    }
    settle().await;

    assert_eq!(runtime.datastore.statement_count(), 0);
    assert!(runtime.probe.product_info_requests().is_empty());
    assert!(!runtime.announcer.contains("Changelist"));
}

#[tokio::test(start_paused = true)]
async fn test_new_changelist_persists_announces_and_requests_info() {
    let runtime = TestSetup::default().start().await;

    let diff = ChangelistDiff::new(ChangeNumber::new(104))
        .with_app(AppId(440), ChangeNumber::new(104))
        .with_package(PackageId(7), ChangeNumber::new(103));
    runtime.probe.emit_changes(JobId(900), diff).await.unwrap();
    settle().await;

    let requests = runtime.probe.product_info_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, vec![AppId(440)]);
    assert_eq!(requests[0].1, vec![PackageId(7)]);

    let changelist = runtime
        .datastore
        .statements_matching(UPSERT_CURRENT_CHANGELIST_SQL);
    assert_eq!(changelist.len(), 1);
    assert_eq!(changelist[0].params[0], SqlValue::Integer(104));
    assert_eq!(
        runtime.datastore.statements_matching(INSERT_APP_TOUCH_SQL)[0].params,
        vec![SqlValue::Integer(104), SqlValue::Integer(440)]
    );
    assert!(runtime
        .announcer
        .contains("Changelist 104 (1 apps, 1 packages)"));

    // Next poll asks from the new baseline
    advance(Duration::from_secs(1)).await;
    let polls = runtime.probe.change_requests();
    assert_eq!(polls.last().map(|(since, _)| since.value()), Some(104));
}

#[tokio::test(start_paused = true)]
async fn test_empty_changelist_advances_without_request() {
    let runtime = TestSetup::default().start().await;

    runtime
        .probe
        .emit_changes(JobId(900), ChangelistDiff::new(ChangeNumber::new(101)))
        .await
        .unwrap();
    settle().await;

    assert_eq!(runtime.datastore.statement_count(), 1);
    assert!(runtime.probe.product_info_requests().is_empty());
    assert!(runtime.announcer.contains("Changelist 101 (0 apps, 0 packages)"));
}

#[tokio::test(start_paused = true)]
async fn test_bulk_reply_reaches_processor() {
    let runtime = TestSetup::default().start().await;

    let mut reply = ProductInfoReply::default();
    reply.apps.insert(AppId(440), info(104));
    reply.packages.insert(PackageId(7), info(103));
    runtime
        .probe
        .emit_product_info(JobId(77), reply)
        .await
        .unwrap();
    settle().await;
    runtime.handle.wait_for_workers().await;

    let mut processed = runtime.processor.processed();
    processed.sort_by_key(|entity| (entity.kind().as_str(), entity.raw_id()));
    assert_eq!(
        processed,
        vec![EntityRef::App(AppId(440)), EntityRef::Package(PackageId(7))]
    );
    assert_eq!(runtime.handle.dispatch_stats().completed, 2);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_apps_processed_outside_known_only_mode() {
    let runtime = TestSetup::default().start().await;

    let reply = ProductInfoReply {
        unknown_apps: vec![AppId(12)],
        unknown_packages: vec![PackageId(13)],
        ..ProductInfoReply::default()
    };
    runtime
        .probe
        .emit_product_info(JobId(5), reply)
        .await
        .unwrap();
    settle().await;
    runtime.handle.wait_for_workers().await;

    assert_eq!(runtime.processor.unknown(), vec![AppId(12)]);
}

// ----------------------------------------------------------------------------
// Full-Run Mode
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_full_run_requests_everything_once() {
    let runtime = TestSetup {
        full_run: FullRun::KnownOnly,
        ..TestSetup::default()
    }
    .start()
    .await;

    let requests = runtime.probe.change_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, ChangeNumber::FULL_RUN_SENTINEL);

    let everything = ChangelistDiff::new(ChangeNumber::new(500))
        .with_app(AppId(1), ChangeNumber::new(480))
        .with_app(AppId(2), ChangeNumber::new(499))
        .with_package(PackageId(3), ChangeNumber::new(12));
    runtime
        .probe
        .emit_changes(requests[0].1, everything)
        .await
        .unwrap();
    settle().await;

    let info_requests = runtime.probe.product_info_requests();
    assert_eq!(info_requests.len(), 1);
    assert_eq!(info_requests[0].0, vec![AppId(1), AppId(2)]);
    assert_eq!(info_requests[0].1, vec![PackageId(3)]);
    assert_eq!(runtime.datastore.statement_count(), 0);

    // Latched: later diffs are dropped
    runtime
        .probe
        .emit_changes(
            JobId(901),
            ChangelistDiff::new(ChangeNumber::new(501)).with_app(AppId(9), ChangeNumber::new(501)),
        )
        .await
        .unwrap();
    settle().await;
    assert_eq!(runtime.probe.product_info_requests().len(), 1);

    // No timer is armed in full-run mode
    advance(Duration::from_secs(5)).await;
    assert_eq!(runtime.probe.change_requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_full_run_is_not_reissued_after_relogin() {
    let runtime = TestSetup {
        full_run: FullRun::IncludeUnknown,
        ..TestSetup::default()
    }
    .start()
    .await;
    assert_eq!(runtime.probe.change_requests().len(), 1);

    runtime.probe.emit(SessionEvent::Disconnected).await.unwrap();
    advance(Duration::from_secs(16)).await;

    assert_eq!(runtime.probe.logon_count(), 2);
    assert_eq!(runtime.probe.change_requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_known_only_full_run_skips_unknown_apps() {
    let runtime = TestSetup {
        full_run: FullRun::KnownOnly,
        ..TestSetup::default()
    }
    .start()
    .await;

    let mut reply = ProductInfoReply {
        unknown_apps: vec![AppId(12)],
        ..ProductInfoReply::default()
    };
    reply.apps.insert(AppId(1), info(480));
    runtime
        .probe
        .emit_product_info(JobId(5), reply)
        .await
        .unwrap();
    settle().await;
    runtime.handle.wait_for_workers().await;

    assert_eq!(runtime.processor.processed(), vec![EntityRef::App(AppId(1))]);
    assert!(runtime.processor.unknown().is_empty());
}
