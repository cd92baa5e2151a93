//! Change persistence
//!
//! Records which changelist touched which entities. Every statement is an
//! idempotent upsert or insert-ignore, so a poll that is replayed or raced by
//! another poll never produces duplicate rows.

use picsync_core::{
    ChangeNumber, ChangelistDiff, Datastore, DatastoreError, EntityChange, EntityKind, SqlValue,
    TimeSource,
};
use std::sync::Arc;
use tracing::{debug, error};

// ----------------------------------------------------------------------------
// Statements
// ----------------------------------------------------------------------------

pub const LATEST_CHANGELIST_SQL: &str =
    "SELECT change_id FROM changelists ORDER BY change_id DESC LIMIT 1";

/// Written for the changelist that was just polled; refreshes the date
pub const UPSERT_CURRENT_CHANGELIST_SQL: &str = "INSERT INTO changelists (change_id, date) \
     VALUES (?1, ?2) ON CONFLICT(change_id) DO UPDATE SET date = excluded.date";

/// Written for an entity's own change number; never touches an existing date
pub const INSERT_INDIRECT_CHANGELIST_SQL: &str = "INSERT INTO changelists (change_id, date) \
     VALUES (?1, ?2) ON CONFLICT(change_id) DO NOTHING";

pub const INSERT_APP_TOUCH_SQL: &str = "INSERT INTO changelists_apps (change_id, app_id) \
     VALUES (?1, ?2) ON CONFLICT DO NOTHING";

pub const INSERT_PACKAGE_TOUCH_SQL: &str = "INSERT INTO changelists_subs (change_id, sub_id) \
     VALUES (?1, ?2) ON CONFLICT DO NOTHING";

pub const TOUCH_APP_LAST_UPDATED_SQL: &str = "UPDATE apps SET last_updated = ?1 WHERE app_id = ?2";

pub const TOUCH_PACKAGE_LAST_UPDATED_SQL: &str =
    "UPDATE subs SET last_updated = ?1 WHERE sub_id = ?2";

// ----------------------------------------------------------------------------
// Persistence Summary
// ----------------------------------------------------------------------------

/// Outcome of persisting one diff
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistenceSummary {
    /// Statements that executed successfully
    pub statements: usize,
    /// Statements that failed and were skipped
    pub failures: usize,
}

impl PersistenceSummary {
    fn record(&mut self, outcome: Result<u64, DatastoreError>, what: &str) {
        match outcome {
            Ok(_) => self.statements += 1,
            Err(e) => {
                error!("Failed to persist {}: {}", what, e);
                self.failures += 1;
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures == 0
    }
}

// ----------------------------------------------------------------------------
// Change Persistence
// ----------------------------------------------------------------------------

pub struct ChangePersistence {
    datastore: Arc<dyn Datastore>,
    time_source: Arc<dyn TimeSource>,
}

impl ChangePersistence {
    pub fn new(datastore: Arc<dyn Datastore>, time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            datastore,
            time_source,
        }
    }

    /// Highest changelist ever persisted, if any
    pub async fn latest_change_number(&self) -> Result<Option<ChangeNumber>, DatastoreError> {
        let latest = self.datastore.query_u32(LATEST_CHANGELIST_SQL).await?;
        Ok(latest.map(ChangeNumber::new))
    }

    /// Persist everything a newly observed diff implies
    ///
    /// The changelist row comes first; entity rows are written only when the
    /// diff names at least one entity. A failing statement is logged and the
    /// remaining statements still run.
    pub async fn persist_diff(&self, diff: &ChangelistDiff) -> PersistenceSummary {
        let mut summary = PersistenceSummary::default();
        let now = self.time_source.now().as_secs();
        let current = diff.current_change_number;

        let outcome = self
            .datastore
            .execute(
                UPSERT_CURRENT_CHANGELIST_SQL,
                &[current.value().into(), now.into()],
            )
            .await;
        summary.record(outcome, &format!("changelist {}", current));

        for change in diff.entity_changes() {
            self.persist_entity(current, change, now, &mut summary).await;
        }

        debug!(
            "Persisted changelist {}: {} statements, {} failures",
            current, summary.statements, summary.failures
        );
        summary
    }

    async fn persist_entity(
        &self,
        current: ChangeNumber,
        change: EntityChange,
        now: i64,
        summary: &mut PersistenceSummary,
    ) {
        let entity = change.entity;
        let id = SqlValue::from(entity.raw_id());

        if change.change_number != current {
            let outcome = self
                .datastore
                .execute(
                    INSERT_INDIRECT_CHANGELIST_SQL,
                    &[change.change_number.value().into(), now.into()],
                )
                .await;
            summary.record(outcome, &format!("changelist {} for {}", change.change_number, entity));
        }

        let (touch_sql, last_updated_sql) = match entity.kind() {
            EntityKind::App => (INSERT_APP_TOUCH_SQL, TOUCH_APP_LAST_UPDATED_SQL),
            EntityKind::Package => (INSERT_PACKAGE_TOUCH_SQL, TOUCH_PACKAGE_LAST_UPDATED_SQL),
        };

        let outcome = self
            .datastore
            .execute(touch_sql, &[current.value().into(), id.clone()])
            .await;
        summary.record(outcome, &format!("touch of {} in {}", entity, current));

        let outcome = self
            .datastore
            .execute(last_updated_sql, &[now.into(), id])
            .await;
        summary.record(outcome, &format!("last update of {}", entity));
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use picsync_core::{AppId, PackageId, Timestamp};
    use picsync_harness::{FixedTimeSource, RecordingDatastore};

    fn persistence(datastore: Arc<RecordingDatastore>) -> ChangePersistence {
        ChangePersistence::new(datastore, Arc::new(FixedTimeSource(Timestamp::from_secs(1_700))))
    }

    #[tokio::test]
    async fn test_empty_diff_writes_only_changelist() {
        let datastore = Arc::new(RecordingDatastore::new());
        let summary = persistence(datastore.clone())
            .persist_diff(&ChangelistDiff::new(ChangeNumber::new(500)))
            .await;

        assert_eq!(summary.statements, 1);
        let statements = datastore.statements();
        assert_eq!(statements[0].sql, UPSERT_CURRENT_CHANGELIST_SQL);
        assert_eq!(
            statements[0].params,
            vec![SqlValue::Integer(500), SqlValue::Integer(1_700)]
        );
    }

    #[tokio::test]
    async fn test_entity_rows_use_current_change_number() {
        let datastore = Arc::new(RecordingDatastore::new());
        let diff = ChangelistDiff::new(ChangeNumber::new(500))
            .with_app(AppId(10), ChangeNumber::new(500))
            .with_package(PackageId(20), ChangeNumber::new(498));

        let summary = persistence(datastore.clone()).persist_diff(&diff).await;
        assert!(summary.is_clean());

        let sqls: Vec<String> = datastore.statements().into_iter().map(|s| s.sql).collect();
        assert_eq!(
            sqls,
            vec![
                UPSERT_CURRENT_CHANGELIST_SQL,
                INSERT_APP_TOUCH_SQL,
                TOUCH_APP_LAST_UPDATED_SQL,
                INSERT_INDIRECT_CHANGELIST_SQL,
                INSERT_PACKAGE_TOUCH_SQL,
                TOUCH_PACKAGE_LAST_UPDATED_SQL,
            ]
        );

        let package_touch = datastore.statements_matching(INSERT_PACKAGE_TOUCH_SQL);
        assert_eq!(
            package_touch[0].params,
            vec![SqlValue::Integer(500), SqlValue::Integer(20)]
        );
        let indirect = datastore.statements_matching(INSERT_INDIRECT_CHANGELIST_SQL);
        assert_eq!(indirect[0].params[0], SqlValue::Integer(498));
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_remaining_statements() {
        let datastore = Arc::new(RecordingDatastore::new());
        datastore.fail_statements_matching("changelists_apps");
        let diff = ChangelistDiff::new(ChangeNumber::new(9))
            .with_app(AppId(1), ChangeNumber::new(9))
            .with_app(AppId(2), ChangeNumber::new(9));

        let summary = persistence(datastore.clone()).persist_diff(&diff).await;
        assert_eq!(summary.failures, 2);
        assert_eq!(summary.statements, 3);
    }

    #[tokio::test]
    async fn test_latest_change_number() {
        let datastore = Arc::new(RecordingDatastore::new());
        let persistence = persistence(datastore.clone());
        assert_eq!(persistence.latest_change_number().await.unwrap(), None);

        datastore.set_latest_change(Some(4_242));
        assert_eq!(
            persistence.latest_change_number().await.unwrap(),
            Some(ChangeNumber::new(4_242))
        );
    }
}
