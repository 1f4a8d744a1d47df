//! In-memory store backend

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use super::{paginate, Page, PromptPage, PromptStore, SessionLedger};
use crate::error::{Error, Result};
use crate::models::{DesktopMutation, PromptRecord, SessionStatus, SyncSession};
use crate::sync::Clock;

type PromptKey = (String, String);

/// Process-local prompt store and session ledger.
///
/// The write lock makes each version check and write a single atomic step.
#[derive(Default)]
pub struct InMemoryStore {
    prompts: RwLock<HashMap<PromptKey, PromptRecord>>,
    sessions: RwLock<Vec<SyncSession>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_prompts(&self) -> Result<RwLockReadGuard<'_, HashMap<PromptKey, PromptRecord>>> {
        self.prompts
            .read()
            .map_err(|_| Error::Storage("prompt store lock poisoned".to_string()))
    }

    fn write_prompts(&self) -> Result<RwLockWriteGuard<'_, HashMap<PromptKey, PromptRecord>>> {
        self.prompts
            .write()
            .map_err(|_| Error::Storage("prompt store lock poisoned".to_string()))
    }

    fn read_sessions(&self) -> Result<RwLockReadGuard<'_, Vec<SyncSession>>> {
        self.sessions
            .read()
            .map_err(|_| Error::Storage("session ledger lock poisoned".to_string()))
    }

    fn user_records(&self, user_id: &str) -> Result<Vec<PromptRecord>> {
        Ok(self
            .read_prompts()?
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect())
    }
}

fn key(user_id: &str, desktop_id: &str) -> PromptKey {
    (user_id.to_string(), desktop_id.to_string())
}

impl PromptStore for InMemoryStore {
    fn find_by_desktop_id(
        &self,
        user_id: &str,
        desktop_id: &str,
    ) -> Result<Option<PromptRecord>> {
        Ok(self.read_prompts()?.get(&key(user_id, desktop_id)).cloned())
    }

    fn create(
        &self,
        user_id: &str,
        mutation: &DesktopMutation,
        clock: &dyn Clock,
    ) -> Result<PromptRecord> {
        let mut prompts = self.write_prompts()?;
        let key = key(user_id, &mutation.desktop_id);
        if let Some(existing) = prompts.get(&key) {
            return Err(Error::VersionConflict {
                desktop_id: mutation.desktop_id.clone(),
                current_version: existing.version,
            });
        }
        let record = PromptRecord::from_mutation(user_id, mutation, clock.now());
        prompts.insert(key, record.clone());
        Ok(record)
    }

    fn update(
        &self,
        user_id: &str,
        mutation: &DesktopMutation,
        expected_version: i64,
        clock: &dyn Clock,
    ) -> Result<PromptRecord> {
        let mut prompts = self.write_prompts()?;
        let record = prompts
            .get_mut(&key(user_id, &mutation.desktop_id))
            .ok_or_else(|| Error::NotFound(mutation.desktop_id.clone()))?;
        if record.version != expected_version {
            return Err(Error::VersionConflict {
                desktop_id: mutation.desktop_id.clone(),
                current_version: record.version,
            });
        }
        record.apply(mutation, clock.now());
        Ok(record.clone())
    }

    fn get_by_user_id(&self, user_id: &str) -> Result<Vec<PromptRecord>> {
        let mut records = self.user_records(user_id)?;
        records.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    fn get_all_for_sync(&self, user_id: &str, page: Page) -> Result<PromptPage> {
        Ok(paginate(self.user_records(user_id)?, page))
    }

    fn get_updated_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        page: Page,
    ) -> Result<PromptPage> {
        let records = self
            .user_records(user_id)?
            .into_iter()
            .filter(|record| record.updated_at > since)
            .collect();
        Ok(paginate(records, page))
    }

    fn count_by_user_id(&self, user_id: &str) -> Result<usize> {
        Ok(self
            .read_prompts()?
            .values()
            .filter(|record| record.user_id == user_id)
            .count())
    }
}

impl SessionLedger for InMemoryStore {
    fn append(&self, session: &SyncSession) -> Result<()> {
        self.sessions
            .write()
            .map_err(|_| Error::Storage("session ledger lock poisoned".to_string()))?
            .push(session.clone());
        Ok(())
    }

    fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<SyncSession>> {
        Ok(self
            .read_sessions()?
            .iter()
            .rev()
            .filter(|session| session.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    fn last_successful(&self, user_id: &str) -> Result<Option<SyncSession>> {
        Ok(self
            .read_sessions()?
            .iter()
            .rev()
            .find(|session| session.user_id == user_id && session.status.is_success())
            .cloned())
    }

    fn pending_conflict_sessions(&self, user_id: &str) -> Result<usize> {
        Ok(self
            .read_sessions()?
            .iter()
            .rev()
            .filter(|session| session.user_id == user_id)
            .take_while(|session| session.status != SessionStatus::Completed)
            .filter(|session| session.status == SessionStatus::CompletedWithConflicts)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionTally;
    use crate::sync::ManualClock;
    use chrono::{Duration, TimeZone};

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn at(minutes: i64) -> ManualClock {
        ManualClock::new(t(minutes))
    }

    fn mutation(desktop_id: &str, version: i64) -> DesktopMutation {
        DesktopMutation {
            desktop_id: desktop_id.to_string(),
            title: "Title".to_string(),
            content: "Content".to_string(),
            tags: Vec::new(),
            is_public: false,
            quick_access_key: None,
            version,
            last_modified: t(0),
        }
    }

    fn session(user_id: &str, id: &str, status: SessionStatus) -> SyncSession {
        SyncSession::finalize(user_id, id, t(0), t(1), SessionTally::default(), status)
    }

    #[test]
    fn create_rejects_duplicate_desktop_id() {
        let store = InMemoryStore::new();
        store.create("u1", &mutation("d1", 1), &at(0)).unwrap();
        let err = store.create("u1", &mutation("d1", 1), &at(1)).unwrap_err();
        assert!(matches!(
            err,
            Error::VersionConflict {
                current_version: 1,
                ..
            }
        ));
    }

    #[test]
    fn update_checks_expected_version() {
        let store = InMemoryStore::new();
        store.create("u1", &mutation("d1", 1), &at(0)).unwrap();

        let updated = store.update("u1", &mutation("d1", 1), 1, &at(1)).unwrap();
        assert_eq!(updated.version, 2);

        let err = store.update("u1", &mutation("d1", 1), 1, &at(2)).unwrap_err();
        assert!(matches!(
            err,
            Error::VersionConflict {
                current_version: 2,
                ..
            }
        ));

        let missing = store.update("u1", &mutation("nope", 1), 1, &at(2)).unwrap_err();
        assert!(matches!(missing, Error::NotFound(_)));
    }

    #[test]
    fn records_are_scoped_per_user() {
        let store = InMemoryStore::new();
        store.create("u1", &mutation("d1", 1), &at(0)).unwrap();
        store.create("u2", &mutation("d1", 1), &at(0)).unwrap();

        assert_eq!(store.count_by_user_id("u1").unwrap(), 1);
        assert_eq!(store.count_by_user_id("u2").unwrap(), 1);
        assert!(store.find_by_desktop_id("u3", "d1").unwrap().is_none());
    }

    #[test]
    fn updated_since_is_strictly_after() {
        let store = InMemoryStore::new();
        store.create("u1", &mutation("d1", 1), &at(0)).unwrap();
        store.create("u1", &mutation("d2", 1), &at(5)).unwrap();

        let page = store.get_updated_since("u1", t(0), Page::new(0, 10)).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.prompts[0].desktop_id, "d2");
    }

    #[test]
    fn pending_conflicts_reset_after_clean_session() {
        let store = InMemoryStore::new();
        store
            .append(&session("u1", "s1", SessionStatus::CompletedWithConflicts))
            .unwrap();
        store
            .append(&session("u1", "s2", SessionStatus::Completed))
            .unwrap();
        store
            .append(&session("u1", "s3", SessionStatus::CompletedWithConflicts))
            .unwrap();
        store.append(&session("u1", "s4", SessionStatus::Failed)).unwrap();
        store
            .append(&session("u2", "x", SessionStatus::CompletedWithConflicts))
            .unwrap();

        assert_eq!(store.pending_conflict_sessions("u1").unwrap(), 1);
        assert_eq!(
            store.last_successful("u1").unwrap().unwrap().session_id,
            "s3"
        );
        let recent = store.recent("u1", 2).unwrap();
        assert_eq!(recent[0].session_id, "s4");
        assert_eq!(recent[1].session_id, "s3");
    }
}
