//! SQLite prompt store

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use super::connection::{with_connection, SharedDatabase};
use super::{from_millis, to_millis, to_sql_count};
use crate::error::{Error, Result};
use crate::models::{normalize_tags, DesktopMutation, PromptRecord};
use crate::store::{Page, PromptPage, PromptStore};
use crate::sync::Clock;

const PROMPT_COLUMNS: &str = "id, user_id, desktop_id, title, content, tags, is_public, \
     quick_access_key, version, created_at, updated_at";

/// `SQLite` implementation of [`PromptStore`]
#[derive(Clone)]
pub struct SqlitePromptStore {
    db: SharedDatabase,
}

impl SqlitePromptStore {
    /// Create a new store over the given shared database
    pub const fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    fn find(conn: &Connection, user_id: &str, desktop_id: &str) -> Result<Option<PromptRecord>> {
        let sql = format!(
            "SELECT {PROMPT_COLUMNS} FROM prompts WHERE user_id = ?1 AND desktop_id = ?2"
        );
        conn.query_row(&sql, params![user_id, desktop_id], PromptRow::read)
            .optional()?
            .map(PromptRecord::try_from)
            .transpose()
    }

    fn page(
        conn: &Connection,
        user_id: &str,
        since: Option<DateTime<Utc>>,
        page: Page,
    ) -> Result<PromptPage> {
        // i64::MIN keeps one statement shape for both full and incremental reads
        let since_ms = since.map_or(i64::MIN, to_millis);

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM prompts WHERE user_id = ?1 AND updated_at > ?2",
            params![user_id, since_ms],
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {PROMPT_COLUMNS}
             FROM prompts
             WHERE user_id = ?1 AND updated_at > ?2
             ORDER BY updated_at ASC, id ASC
             LIMIT ?3 OFFSET ?4"
        );
        let mut stmt = conn.prepare(&sql)?;
        let prompts = stmt
            .query_map(
                params![
                    user_id,
                    since_ms,
                    to_sql_count(page.limit),
                    to_sql_count(page.offset)
                ],
                PromptRow::read,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(PromptRecord::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(PromptPage {
            prompts,
            total: usize::try_from(total).unwrap_or(0),
        })
    }
}

impl PromptStore for SqlitePromptStore {
    fn find_by_desktop_id(
        &self,
        user_id: &str,
        desktop_id: &str,
    ) -> Result<Option<PromptRecord>> {
        with_connection(&self.db, |conn| Self::find(conn, user_id, desktop_id))
    }

    fn create(
        &self,
        user_id: &str,
        mutation: &DesktopMutation,
        clock: &dyn Clock,
    ) -> Result<PromptRecord> {
        with_connection(&self.db, |conn| {
            let record = PromptRecord::from_mutation(user_id, mutation, clock.now());
            let inserted = conn.execute(
                "INSERT INTO prompts
                    (id, user_id, desktop_id, title, content, tags, is_public,
                     quick_access_key, version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.id.as_str(),
                    record.user_id,
                    record.desktop_id,
                    record.title,
                    record.content,
                    serde_json::to_string(&record.tags)?,
                    record.is_public,
                    record.quick_access_key,
                    record.version,
                    to_millis(record.created_at),
                    to_millis(record.updated_at),
                ],
            );

            match inserted {
                Ok(_) => Ok(record),
                Err(rusqlite::Error::SqliteFailure(error, _))
                    if error.code == ErrorCode::ConstraintViolation =>
                {
                    let existing = Self::find(conn, user_id, &mutation.desktop_id)?
                        .ok_or_else(|| Error::NotFound(mutation.desktop_id.clone()))?;
                    Err(Error::VersionConflict {
                        desktop_id: mutation.desktop_id.clone(),
                        current_version: existing.version,
                    })
                }
                Err(error) => Err(error.into()),
            }
        })
    }

    fn update(
        &self,
        user_id: &str,
        mutation: &DesktopMutation,
        expected_version: i64,
        clock: &dyn Clock,
    ) -> Result<PromptRecord> {
        with_connection(&self.db, |conn| {
            let tags = normalize_tags(mutation.tags.iter().cloned());
            let rows = conn.execute(
                "UPDATE prompts
                 SET title = ?1, content = ?2, tags = ?3, is_public = ?4,
                     quick_access_key = ?5, version = version + 1, updated_at = ?6
                 WHERE user_id = ?7 AND desktop_id = ?8 AND version = ?9",
                params![
                    mutation.title,
                    mutation.content,
                    serde_json::to_string(&tags)?,
                    mutation.is_public,
                    mutation.quick_access_key,
                    to_millis(clock.now()),
                    user_id,
                    mutation.desktop_id,
                    expected_version,
                ],
            )?;

            let current = Self::find(conn, user_id, &mutation.desktop_id)?
                .ok_or_else(|| Error::NotFound(mutation.desktop_id.clone()))?;
            if rows == 0 {
                return Err(Error::VersionConflict {
                    desktop_id: mutation.desktop_id.clone(),
                    current_version: current.version,
                });
            }
            Ok(current)
        })
    }

    fn get_by_user_id(&self, user_id: &str) -> Result<Vec<PromptRecord>> {
        with_connection(&self.db, |conn| {
            let sql = format!(
                "SELECT {PROMPT_COLUMNS} FROM prompts WHERE user_id = ?1
                 ORDER BY updated_at ASC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![user_id], PromptRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(PromptRecord::try_from).collect()
        })
    }

    fn get_all_for_sync(&self, user_id: &str, page: Page) -> Result<PromptPage> {
        with_connection(&self.db, |conn| Self::page(conn, user_id, None, page))
    }

    fn get_updated_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        page: Page,
    ) -> Result<PromptPage> {
        with_connection(&self.db, |conn| Self::page(conn, user_id, Some(since), page))
    }

    fn count_by_user_id(&self, user_id: &str) -> Result<usize> {
        with_connection(&self.db, |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM prompts WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }
}

/// Raw column values, converted to a record outside the row callback
struct PromptRow {
    id: String,
    user_id: String,
    desktop_id: String,
    title: String,
    content: String,
    tags: String,
    is_public: bool,
    quick_access_key: Option<String>,
    version: i64,
    created_at: i64,
    updated_at: i64,
}

impl PromptRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            desktop_id: row.get(2)?,
            title: row.get(3)?,
            content: row.get(4)?,
            tags: row.get(5)?,
            is_public: row.get(6)?,
            quick_access_key: row.get(7)?,
            version: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

impl TryFrom<PromptRow> for PromptRecord {
    type Error = Error;

    fn try_from(row: PromptRow) -> Result<Self> {
        Ok(Self {
            id: row
                .id
                .parse()
                .map_err(|_| Error::Storage(format!("invalid prompt id `{}`", row.id)))?,
            user_id: row.user_id,
            desktop_id: row.desktop_id,
            title: row.title,
            content: row.content,
            tags: serde_json::from_str(&row.tags)?,
            is_public: row.is_public,
            quick_access_key: row.quick_access_key,
            version: row.version,
            created_at: from_millis(row.created_at)?,
            updated_at: from_millis(row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::sync::ManualClock;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn setup() -> SqlitePromptStore {
        SqlitePromptStore::new(Database::open_in_memory().unwrap().into_shared())
    }

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn at(minutes: i64) -> ManualClock {
        ManualClock::new(t(minutes))
    }

    fn mutation(desktop_id: &str, title: &str, version: i64) -> DesktopMutation {
        DesktopMutation {
            desktop_id: desktop_id.to_string(),
            title: title.to_string(),
            content: "Body".to_string(),
            tags: vec!["zeta".to_string(), "alpha".to_string()],
            is_public: true,
            quick_access_key: Some("q".to_string()),
            version,
            last_modified: t(0),
        }
    }

    #[test]
    fn test_create_and_find() {
        let store = setup();
        let created = store.create("u1", &mutation("d1", "A", 1), &at(0)).unwrap();

        let fetched = store.find_by_desktop_id("u1", "d1").unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.tags, vec!["alpha", "zeta"]);
        assert_eq!(fetched.version, 1);
    }

    #[test]
    fn test_create_duplicate_reports_stored_version() {
        let store = setup();
        store.create("u1", &mutation("d1", "A", 1), &at(0)).unwrap();
        store.update("u1", &mutation("d1", "B", 1), 1, &at(1)).unwrap();

        let err = store.create("u1", &mutation("d1", "C", 1), &at(2)).unwrap_err();
        assert!(matches!(
            err,
            Error::VersionConflict {
                current_version: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_update_is_version_checked() {
        let store = setup();
        store.create("u1", &mutation("d1", "A", 1), &at(0)).unwrap();

        let updated = store.update("u1", &mutation("d1", "B", 1), 1, &at(1)).unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.title, "B");
        assert_eq!(updated.updated_at, t(1));
        assert_eq!(updated.created_at, t(0));

        let stale = store.update("u1", &mutation("d1", "C", 1), 1, &at(2)).unwrap_err();
        assert!(stale.is_conflict());
        let title = store.find_by_desktop_id("u1", "d1").unwrap().unwrap().title;
        assert_eq!(title, "B");

        let missing = store.update("u1", &mutation("d9", "C", 1), 1, &at(2)).unwrap_err();
        assert!(matches!(missing, Error::NotFound(_)));
    }

    #[test]
    fn test_pages_are_ordered_and_counted() {
        let store = setup();
        store.create("u1", &mutation("d1", "A", 1), &at(3)).unwrap();
        store.create("u1", &mutation("d2", "B", 1), &at(1)).unwrap();
        store.create("u1", &mutation("d3", "C", 1), &at(2)).unwrap();
        store.create("u2", &mutation("d1", "X", 1), &at(0)).unwrap();

        let first = store.get_all_for_sync("u1", Page::new(0, 2)).unwrap();
        assert_eq!(first.total, 3);
        let ids: Vec<_> = first.prompts.iter().map(|p| p.desktop_id.as_str()).collect();
        assert_eq!(ids, vec!["d2", "d3"]);

        let beyond = store.get_all_for_sync("u1", Page::new(3, 2)).unwrap();
        assert_eq!(beyond.total, 3);
        assert!(beyond.prompts.is_empty());

        let since = store.get_updated_since("u1", t(2), Page::new(0, 10)).unwrap();
        assert_eq!(since.total, 1);
        assert_eq!(since.prompts[0].desktop_id, "d1");

        assert_eq!(store.get_by_user_id("u1").unwrap().len(), 3);
        assert_eq!(store.count_by_user_id("u2").unwrap(), 1);
    }
}
