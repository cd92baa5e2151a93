//! End-to-end mirror tests: scripted session into an in-memory SQLite store

use picsync_cli::{run_session, AppConfig, SqliteStore};
use picsync_core::FullRun;
use picsync_harness::SessionScript;
use std::time::Duration;

const SCRIPT: &str = r#"{
    "server_time": "2013-04-01 12:00:00",
    "changelists": [
        { "current_change_number": 101, "app_changes": { "440": 101 } },
        { "current_change_number": 105, "package_changes": { "7": 104 } }
    ],
    "catalog": {
        "apps": {
            "440": { "change_number": 101, "payload": { "common": { "name": "Team Fortress 2" } } }
        },
        "packages": {
            "7": { "change_number": 104, "payload": { "name": "Orange Box" } }
        }
    }
}"#;

fn config(full_run: FullRun) -> AppConfig {
    let mut config = AppConfig::default();
    config.credentials.username = "mirror".to_string();
    config.full_run = full_run;
    config.runtime.max_workers = 2;
    config
}

async fn store() -> SqliteStore {
    let store = SqliteStore::in_memory().await.unwrap();
    store.migrate().await.unwrap();
    store
}

async fn count(store: &SqliteStore, sql: &str) -> i64 {
    sqlx::query_scalar(sql)
        .fetch_one(store.pool())
        .await
        .unwrap()
}

/// Resolves once every query reports at least one row
async fn rows_present(store: SqliteStore, queries: &'static [&'static str]) {
    loop {
        let mut ready = true;
        for sql in queries {
            if count(&store, sql).await == 0 {
                ready = false;
                break;
            }
        }
        if ready {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn test_incremental_mirror_records_changelists() {
    let store = store().await;
    let script = SessionScript::from_json(SCRIPT).unwrap();

    let stop = rows_present(
        store.clone(),
        &[
            "SELECT COUNT(*) FROM changelists_subs WHERE change_id = 105 AND sub_id = 7",
            "SELECT COUNT(*) FROM sub_info WHERE sub_id = 7",
        ],
    );
    let stats = tokio::time::timeout(
        Duration::from_secs(20),
        run_session(&config(FullRun::Disabled), store.clone(), script, stop),
    )
    .await
    .expect("mirror did not catch up")
    .unwrap();

    assert_eq!(stats.logons, 1);
    assert!(stats.diffs_processed >= 2);

    assert_eq!(
        count(&store, "SELECT COUNT(*) FROM changelists WHERE change_id IN (101, 104, 105)").await,
        3
    );
    assert_eq!(
        count(&store, "SELECT COUNT(*) FROM changelists_apps WHERE change_id = 101 AND app_id = 440").await,
        1
    );

    let name: Option<String> = sqlx::query_scalar("SELECT name FROM apps WHERE app_id = 440")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(name.as_deref(), Some("Team Fortress 2"));
}

#[tokio::test]
async fn test_full_run_fetches_catalog_without_changelists() {
    let store = store().await;
    let script = SessionScript::from_json(SCRIPT).unwrap();

    let stop = rows_present(
        store.clone(),
        &[
            "SELECT COUNT(*) FROM app_info WHERE app_id = 440",
            "SELECT COUNT(*) FROM sub_info WHERE sub_id = 7",
        ],
    );
    let stats = tokio::time::timeout(
        Duration::from_secs(20),
        run_session(&config(FullRun::KnownOnly), store.clone(), script, stop),
    )
    .await
    .expect("full run did not finish")
    .unwrap();

    assert_eq!(stats.diffs_processed, 1);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM changelists").await, 0);
}
