//! Sync conflict model

use serde::{Deserialize, Serialize};

/// Classification of a rejected write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    VersionMismatch,
}

/// A desktop mutation refused because its base version is stale.
///
/// Only lives in the upload response; the session keeps the count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub desktop_id: String,
    /// Version currently stored on the server
    pub web_version: i64,
    /// Version the client claimed
    pub desktop_version: i64,
    pub conflict_type: ConflictType,
}

impl ConflictRecord {
    pub fn version_mismatch(
        desktop_id: impl Into<String>,
        web_version: i64,
        desktop_version: i64,
    ) -> Self {
        Self {
            desktop_id: desktop_id.into(),
            web_version,
            desktop_version,
            conflict_type: ConflictType::VersionMismatch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_type_serializes_snake_case() {
        let conflict = ConflictRecord::version_mismatch("d1", 5, 4);
        let json = serde_json::to_value(&conflict).unwrap();
        assert_eq!(json["conflict_type"], "version_mismatch");
        assert_eq!(json["web_version"], 5);
        assert_eq!(json["desktop_version"], 4);
    }
}
