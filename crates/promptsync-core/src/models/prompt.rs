//! Prompt record model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::DesktopMutation;

/// Server-assigned prompt identifier, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PromptId(Uuid);

impl PromptId {
    /// Create a new unique prompt ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for PromptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PromptId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Canonical server-side prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRecord {
    /// Server-assigned identifier
    pub id: PromptId,
    /// Client-assigned identifier, unique per user
    pub desktop_id: String,
    /// Owner
    pub user_id: String,
    pub title: String,
    pub content: String,
    /// Normalized tag set (sorted, deduplicated)
    pub tags: Vec<String>,
    pub is_public: bool,
    pub quick_access_key: Option<String>,
    /// Optimistic concurrency counter, starts at 1
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromptRecord {
    /// Build the first stored version of a desktop mutation
    #[must_use]
    pub fn from_mutation(user_id: &str, mutation: &DesktopMutation, now: DateTime<Utc>) -> Self {
        Self {
            id: PromptId::new(),
            desktop_id: mutation.desktop_id.clone(),
            user_id: user_id.to_string(),
            title: mutation.title.clone(),
            content: mutation.content.clone(),
            tags: normalize_tags(mutation.tags.iter().cloned()),
            is_public: mutation.is_public,
            quick_access_key: mutation.quick_access_key.clone(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an accepted mutation, bumping the version
    pub fn apply(&mut self, mutation: &DesktopMutation, now: DateTime<Utc>) {
        self.title.clone_from(&mutation.title);
        self.content.clone_from(&mutation.content);
        self.tags = normalize_tags(mutation.tags.iter().cloned());
        self.is_public = mutation.is_public;
        self.quick_access_key.clone_from(&mutation.quick_access_key);
        self.version += 1;
        self.updated_at = now;
    }
}

/// Trim tags, drop empties, deduplicate, and sort.
///
/// # Examples
///
/// ```
/// use promptsync_core::models::normalize_tags;
///
/// let tags = normalize_tags(vec![" rust ".to_string(), "ai".to_string(), "rust".to_string()]);
/// assert_eq!(tags, vec!["ai", "rust"]);
/// ```
#[must_use]
pub fn normalize_tags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn mutation(title: &str) -> DesktopMutation {
        DesktopMutation {
            desktop_id: "d1".to_string(),
            title: title.to_string(),
            content: "body".to_string(),
            tags: vec!["b".to_string(), "a".to_string(), "a".to_string()],
            is_public: false,
            quick_access_key: Some("k".to_string()),
            version: 1,
            last_modified: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_prompt_id_unique() {
        assert_ne!(PromptId::new(), PromptId::new());
    }

    #[test]
    fn test_prompt_id_parse() {
        let id = PromptId::new();
        let parsed: PromptId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_from_mutation_starts_at_version_one() {
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let record = PromptRecord::from_mutation("u1", &mutation("A"), now);
        assert_eq!(record.version, 1);
        assert_eq!(record.user_id, "u1");
        assert_eq!(record.tags, vec!["a", "b"]);
        assert_eq!(record.created_at, now);
        assert_eq!(record.updated_at, now);
    }

    #[test]
    fn test_apply_bumps_version_and_keeps_created_at() {
        let created = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap();
        let mut record = PromptRecord::from_mutation("u1", &mutation("A"), created);
        record.apply(&mutation("B"), later);

        assert_eq!(record.version, 2);
        assert_eq!(record.title, "B");
        assert_eq!(record.created_at, created);
        assert_eq!(record.updated_at, later);
    }

    #[test]
    fn test_normalize_tags_drops_blank() {
        let tags = normalize_tags(vec!["  ".to_string(), String::new(), "x".to_string()]);
        assert_eq!(tags, vec!["x"]);
    }
}
