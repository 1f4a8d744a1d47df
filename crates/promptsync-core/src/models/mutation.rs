//! Desktop mutation model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A validated, client-submitted candidate change to a prompt.
///
/// Carries the version the client based its edit on. Never persisted
/// verbatim; the resolver reduces it to an action on the stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesktopMutation {
    pub desktop_id: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub quick_access_key: Option<String>,
    /// Version the client believes is current
    pub version: i64,
    /// Client-side modification time
    pub last_modified: DateTime<Utc>,
}
