//! Entity processor that stores product info in the local mirror

use picsync_core::{
    AppId, Datastore, EntityKind, EntityProcessor, EntityRef, ProcessingError, ProductInfo,
    SqlValue,
};
use std::sync::Arc;
use tracing::{debug, info};

pub const UPSERT_APP_INFO_SQL: &str = "INSERT INTO app_info (app_id, change_number, payload) \
     VALUES (?1, ?2, ?3) \
     ON CONFLICT(app_id) DO UPDATE SET change_number = excluded.change_number, payload = excluded.payload";

pub const UPSERT_PACKAGE_INFO_SQL: &str = "INSERT INTO sub_info (sub_id, change_number, payload) \
     VALUES (?1, ?2, ?3) \
     ON CONFLICT(sub_id) DO UPDATE SET change_number = excluded.change_number, payload = excluded.payload";

pub const UPSERT_APP_NAME_SQL: &str = "INSERT INTO apps (app_id, name) VALUES (?1, ?2) \
     ON CONFLICT(app_id) DO UPDATE SET name = COALESCE(excluded.name, apps.name)";

pub const UPSERT_PACKAGE_NAME_SQL: &str = "INSERT INTO subs (sub_id, name) VALUES (?1, ?2) \
     ON CONFLICT(sub_id) DO UPDATE SET name = COALESCE(excluded.name, subs.name)";

/// Placeholder name for apps the platform could not resolve
pub fn unknown_app_name(app: AppId) -> String {
    format!("Unknown App {}", app)
}

pub struct StoringProcessor {
    datastore: Arc<dyn Datastore>,
}

impl StoringProcessor {
    pub fn new(datastore: Arc<dyn Datastore>) -> Self {
        Self { datastore }
    }
}

#[async_trait::async_trait]
impl EntityProcessor for StoringProcessor {
    async fn process(&self, entity: EntityRef, info: ProductInfo) -> Result<(), ProcessingError> {
        let name = entity_name(entity, &info.payload)?;
        let payload =
            serde_json::to_string(&info.payload).map_err(|e| ProcessingError::MalformedPayload {
                entity,
                reason: e.to_string(),
            })?;

        let (info_sql, name_sql) = match entity.kind() {
            EntityKind::App => (UPSERT_APP_INFO_SQL, UPSERT_APP_NAME_SQL),
            EntityKind::Package => (UPSERT_PACKAGE_INFO_SQL, UPSERT_PACKAGE_NAME_SQL),
        };
        let id = SqlValue::from(entity.raw_id());

        self.datastore
            .execute(
                info_sql,
                &[id.clone(), info.change_number.value().into(), payload.into()],
            )
            .await?;
        self.datastore
            .execute(name_sql, &[id, name.map_or(SqlValue::Null, SqlValue::Text)])
            .await?;

        debug!("Stored {} at change {}", entity, info.change_number);
        Ok(())
    }

    async fn process_unknown(&self, app: AppId) -> Result<(), ProcessingError> {
        info!("Platform has no info for app {}", app);
        self.datastore
            .execute(
                UPSERT_APP_NAME_SQL,
                &[app.0.into(), unknown_app_name(app).into()],
            )
            .await?;
        Ok(())
    }
}

/// Display name from a payload object, if it carries one
fn entity_name(
    entity: EntityRef,
    payload: &serde_json::Value,
) -> Result<Option<String>, ProcessingError> {
    match payload {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(fields) => Ok(fields
            .get("common")
            .and_then(|common| common.get("name"))
            .or_else(|| fields.get("name"))
            .and_then(|name| name.as_str())
            .map(str::to_string)),
        other => Err(ProcessingError::MalformedPayload {
            entity,
            reason: format!("expected an object, got {}", other),
        }),
    }
}
