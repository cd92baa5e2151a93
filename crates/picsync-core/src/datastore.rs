//! Datastore command executor interface
//!
//! The relational store is reached only through parameterized statements.
//! No transaction boundary is assumed across statements; every statement the
//! runtime issues is idempotent on its own.

use crate::errors::DatastoreError;
use std::fmt;

/// Bound parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Integer(i64),
    Text(String),
    Null,
}

impl From<u32> for SqlValue {
    fn from(value: u32) -> Self {
        SqlValue::Integer(i64::from(value))
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Integer(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "'{}'", v),
            SqlValue::Null => f.write_str("NULL"),
        }
    }
}

/// Parameterized command executor
#[async_trait::async_trait]
pub trait Datastore: Send + Sync {
    /// Execute a statement, returning the number of affected rows
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, DatastoreError>;

    /// Read the first column of the first row as an unsigned integer
    async fn query_u32(&self, sql: &str) -> Result<Option<u32>, DatastoreError>;
}
