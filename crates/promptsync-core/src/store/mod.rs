//! Storage interfaces consumed by the sync engine.
//!
//! Two backends implement them: [`InMemoryStore`] for tests and ephemeral
//! servers, and the SQLite stores in [`crate::db`]. The choice is made once
//! at startup through [`StoreBackend`].

mod memory;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::db::{Database, SqlitePromptStore, SqliteSessionLedger};
use crate::error::Result;
use crate::models::{DesktopMutation, PromptRecord, SyncSession};
use crate::sync::Clock;

pub use memory::InMemoryStore;

/// Offset/limit window into an ordered result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    #[must_use]
    pub const fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }
}

/// One page of prompts plus the size of the full result set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptPage {
    pub prompts: Vec<PromptRecord>,
    pub total: usize,
}

/// Durable prompt storage scoped by owner.
///
/// Paged reads are ordered by `updated_at` ascending, then by `id`.
///
/// Writes read `updated_at` from the clock while holding the same lock or
/// connection that paged reads use. A download whose `syncTimestamp` is later
/// than a write's `updated_at` therefore always sees that write.
pub trait PromptStore: Send + Sync {
    /// Look up the record a desktop client knows as `desktop_id`
    fn find_by_desktop_id(&self, user_id: &str, desktop_id: &str)
        -> Result<Option<PromptRecord>>;

    /// Insert the first version of a prompt.
    ///
    /// Fails with `Error::VersionConflict` if `(user_id, desktop_id)` already exists.
    fn create(
        &self,
        user_id: &str,
        mutation: &DesktopMutation,
        clock: &dyn Clock,
    ) -> Result<PromptRecord>;

    /// Apply a mutation only if the stored version still equals `expected_version`.
    ///
    /// Fails with `Error::NotFound` when the record is gone and
    /// `Error::VersionConflict` when the version moved.
    fn update(
        &self,
        user_id: &str,
        mutation: &DesktopMutation,
        expected_version: i64,
        clock: &dyn Clock,
    ) -> Result<PromptRecord>;

    /// Every prompt the user owns
    fn get_by_user_id(&self, user_id: &str) -> Result<Vec<PromptRecord>>;

    /// Full-sync page
    fn get_all_for_sync(&self, user_id: &str, page: Page) -> Result<PromptPage>;

    /// Incremental page: records with `updated_at > since`
    fn get_updated_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        page: Page,
    ) -> Result<PromptPage>;

    fn count_by_user_id(&self, user_id: &str) -> Result<usize>;
}

/// Append-only history of sync sessions
pub trait SessionLedger: Send + Sync {
    fn append(&self, session: &SyncSession) -> Result<()>;

    /// Most recent sessions first
    fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<SyncSession>>;

    /// Most recent session whose status is not `failed`
    fn last_successful(&self, user_id: &str) -> Result<Option<SyncSession>>;

    /// `completed_with_conflicts` sessions newer than the latest clean `completed` one
    fn pending_conflict_sessions(&self, user_id: &str) -> Result<usize>;
}

/// Storage variant selected at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite(PathBuf),
}

/// Store handles built from a [`StoreBackend`]
#[derive(Clone)]
pub struct Stores {
    pub prompts: Arc<dyn PromptStore>,
    pub sessions: Arc<dyn SessionLedger>,
}

impl StoreBackend {
    /// Open the backend. SQLite files are created and migrated as needed.
    pub fn open(&self) -> Result<Stores> {
        match self {
            Self::Memory => {
                tracing::info!("Using in-memory prompt store");
                let store = Arc::new(InMemoryStore::new());
                Ok(Stores {
                    prompts: store.clone(),
                    sessions: store,
                })
            }
            Self::Sqlite(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                tracing::info!("Using SQLite prompt store at {}", path.display());
                let db = Database::open(path)?.into_shared();
                Ok(Stores {
                    prompts: Arc::new(SqlitePromptStore::new(db.clone())),
                    sessions: Arc::new(SqliteSessionLedger::new(db)),
                })
            }
        }
    }
}

/// Order by `(updated_at, id)` and apply offset/limit
pub(crate) fn paginate(mut records: Vec<PromptRecord>, page: Page) -> PromptPage {
    records.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then(a.id.cmp(&b.id)));
    let total = records.len();
    let prompts = records
        .into_iter()
        .skip(page.offset)
        .take(page.limit)
        .collect();
    PromptPage { prompts, total }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_backend_shares_one_store() {
        let stores = StoreBackend::Memory.open().unwrap();
        assert_eq!(stores.prompts.count_by_user_id("u1").unwrap(), 0);
        assert!(stores.sessions.recent("u1", 10).unwrap().is_empty());
    }

    #[test]
    fn sqlite_backend_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("promptsync.db");
        let stores = StoreBackend::Sqlite(path.clone()).open().unwrap();
        assert_eq!(stores.prompts.count_by_user_id("u1").unwrap(), 0);
        assert!(path.exists());
    }
}
