//! Database connection management

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

use super::migrations;
use crate::error::{Error, Result};

/// Connection shared by the SQLite stores.
///
/// `rusqlite::Connection` is `Send` but not `Sync`, so every store call
/// takes the mutex for the duration of one statement group.
pub type SharedDatabase = Arc<Mutex<Database>>;

/// Database wrapper for a `SQLite` connection
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let database = Self { conn };
        database.configure(true)?;
        database.migrate()?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let database = Self { conn };
        database.configure(false)?;
        database.migrate()?;
        Ok(database)
    }

    fn configure(&self, file_backed: bool) -> Result<()> {
        self.conn.busy_timeout(Duration::from_secs(5))?;
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        if file_backed {
            self.conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        Ok(())
    }

    /// Run pending migrations
    fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn)
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Wrap the database for sharing between stores
    pub fn into_shared(self) -> SharedDatabase {
        Arc::new(Mutex::new(self))
    }
}

/// Run `f` with the shared connection locked
pub(crate) fn with_connection<T>(
    db: &SharedDatabase,
    f: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    let guard = db
        .lock()
        .map_err(|_| Error::Storage("database mutex poisoned".to_string()))?;
    f(guard.connection())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM prompts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_open_file_twice_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("promptsync.db");
        drop(Database::open(&path).unwrap());

        let db = Database::open(&path).unwrap();
        let version: i32 = db
            .connection()
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 2);
    }
}
