//! SQLite datastore
//!
//! Connection pooling and schema management for the local mirror, plus the
//! `Datastore` implementation the runtime writes through.

use picsync_core::{Datastore, DatastoreError, SqlValue};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use tracing::{info, warn};

use crate::config::DatabaseConfig;

/// Tables of the local mirror, created idempotently
pub const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS changelists (
        change_id INTEGER PRIMARY KEY,
        date INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS changelists_apps (
        change_id INTEGER NOT NULL,
        app_id INTEGER NOT NULL,
        PRIMARY KEY (change_id, app_id)
    )",
    "CREATE TABLE IF NOT EXISTS changelists_subs (
        change_id INTEGER NOT NULL,
        sub_id INTEGER NOT NULL,
        PRIMARY KEY (change_id, sub_id)
    )",
    "CREATE TABLE IF NOT EXISTS apps (
        app_id INTEGER PRIMARY KEY,
        name TEXT,
        last_updated INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS subs (
        sub_id INTEGER PRIMARY KEY,
        name TEXT,
        last_updated INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS app_info (
        app_id INTEGER PRIMARY KEY,
        change_number INTEGER NOT NULL,
        payload TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sub_info (
        sub_id INTEGER PRIMARY KEY,
        change_number INTEGER NOT NULL,
        payload TEXT NOT NULL
    )",
];

// ----------------------------------------------------------------------------
// SQLite Store
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatastoreError> {
        info!("Opening database: {}", config.url);

        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(map_sqlx_error)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                warn!("Failed to open database: {}", e);
                map_sqlx_error(e)
            })?;

        Ok(Self { pool })
    }

    /// Private in-memory database on a single connection
    pub async fn in_memory() -> Result<Self, DatastoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(map_sqlx_error)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self { pool })
    }

    /// Create every table that does not exist yet
    pub async fn migrate(&self) -> Result<(), DatastoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        }
        info!("Database schema is up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl Datastore for SqliteStore {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, DatastoreError> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = match param {
                SqlValue::Integer(value) => query.bind(*value),
                SqlValue::Text(value) => query.bind(value.clone()),
                SqlValue::Null => query.bind(Option::<i64>::None),
            };
        }

        let result = query.execute(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn query_u32(&self, sql: &str) -> Result<Option<u32>, DatastoreError> {
        let value: Option<i64> = sqlx::query_scalar(sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        value
            .map(|v| {
                u32::try_from(v).map_err(|e| DatastoreError::Decode {
                    column: "0".to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }
}

fn map_sqlx_error(error: sqlx::Error) -> DatastoreError {
    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            DatastoreError::Unavailable {
                reason: error.to_string(),
            }
        }
        other => DatastoreError::statement(other),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
