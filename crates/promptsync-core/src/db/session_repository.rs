//! SQLite session ledger

use rusqlite::{params, Connection, OptionalExtension};

use super::connection::{with_connection, SharedDatabase};
use super::{from_millis, to_millis, to_sql_count};
use crate::error::{Error, Result};
use crate::models::{SessionStatus, SyncSession};
use crate::store::SessionLedger;

const SESSION_COLUMNS: &str =
    "session_id, user_id, started_at, completed_at, uploaded, updated, conflicts, status";

/// `SQLite` implementation of [`SessionLedger`]. Rows are never updated.
#[derive(Clone)]
pub struct SqliteSessionLedger {
    db: SharedDatabase,
}

impl SqliteSessionLedger {
    pub const fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    fn query(conn: &Connection, sql: &str, user_id: &str, limit: usize) -> Result<Vec<SyncSession>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![user_id, to_sql_count(limit)], SessionRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(SyncSession::try_from).collect()
    }
}

impl SessionLedger for SqliteSessionLedger {
    fn append(&self, session: &SyncSession) -> Result<()> {
        with_connection(&self.db, |conn| {
            conn.execute(
                "INSERT INTO sync_sessions
                    (session_id, user_id, started_at, completed_at,
                     uploaded, updated, conflicts, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    session.session_id,
                    session.user_id,
                    to_millis(session.started_at),
                    to_millis(session.completed_at),
                    session.uploaded,
                    session.updated,
                    session.conflicts,
                    session.status.as_str(),
                ],
            )?;
            Ok(())
        })
    }

    fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<SyncSession>> {
        with_connection(&self.db, |conn| {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM sync_sessions
                 WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2"
            );
            Self::query(conn, &sql, user_id, limit)
        })
    }

    fn last_successful(&self, user_id: &str) -> Result<Option<SyncSession>> {
        with_connection(&self.db, |conn| {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM sync_sessions
                 WHERE user_id = ?1 AND status != 'failed'
                 ORDER BY id DESC LIMIT 1"
            );
            conn.query_row(&sql, params![user_id], SessionRow::read)
                .optional()?
                .map(SyncSession::try_from)
                .transpose()
        })
    }

    fn pending_conflict_sessions(&self, user_id: &str) -> Result<usize> {
        with_connection(&self.db, |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sync_sessions
                 WHERE user_id = ?1
                   AND status = 'completed_with_conflicts'
                   AND id > COALESCE(
                       (SELECT MAX(id) FROM sync_sessions
                        WHERE user_id = ?1 AND status = 'completed'),
                       0)",
                params![user_id],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }
}

struct SessionRow {
    session_id: String,
    user_id: String,
    started_at: i64,
    completed_at: i64,
    uploaded: u32,
    updated: u32,
    conflicts: u32,
    status: String,
}

impl SessionRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            session_id: row.get(0)?,
            user_id: row.get(1)?,
            started_at: row.get(2)?,
            completed_at: row.get(3)?,
            uploaded: row.get(4)?,
            updated: row.get(5)?,
            conflicts: row.get(6)?,
            status: row.get(7)?,
        })
    }
}

impl TryFrom<SessionRow> for SyncSession {
    type Error = Error;

    fn try_from(row: SessionRow) -> Result<Self> {
        let status: SessionStatus = row.status.parse().map_err(Error::Storage)?;
        Ok(Self {
            session_id: row.session_id,
            user_id: row.user_id,
            started_at: from_millis(row.started_at)?,
            completed_at: from_millis(row.completed_at)?,
            uploaded: row.uploaded,
            updated: row.updated,
            conflicts: row.conflicts,
            status,
        })
    }
}
