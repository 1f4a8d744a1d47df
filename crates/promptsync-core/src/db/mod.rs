//! SQLite persistence for prompts and sync sessions

mod connection;
mod migrations;
mod prompt_repository;
mod session_repository;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

pub use connection::{Database, SharedDatabase};
pub use prompt_repository::SqlitePromptStore;
pub use session_repository::SqliteSessionLedger;

/// Timestamps are stored as Unix milliseconds
fn to_millis(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

fn from_millis(value: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value)
        .ok_or_else(|| Error::Storage(format!("timestamp out of range: {value}")))
}

/// SQLite binds LIMIT/OFFSET as i64
fn to_sql_count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
