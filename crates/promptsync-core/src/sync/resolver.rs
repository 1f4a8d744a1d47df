//! Conflict resolution between a desktop mutation and the stored record

use crate::models::{ConflictRecord, DesktopMutation, PromptRecord};

/// What the upload should do with one mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No stored record: insert at version 1
    Create,
    /// Versions match: write, moving the stored version to `next_version`
    Update {
        expected_version: i64,
        next_version: i64,
    },
    /// Versions differ: refuse the write
    Conflict(ConflictRecord),
}

/// Classify `mutation` against the record currently stored for its `desktop_id`.
///
/// Any version mismatch is a conflict, whichever side looks newer by
/// timestamp. The server owns `version`; the client must re-download first.
pub fn resolve(mutation: &DesktopMutation, stored: Option<&PromptRecord>) -> Resolution {
    let Some(stored) = stored else {
        return Resolution::Create;
    };

    if mutation.version == stored.version {
        Resolution::Update {
            expected_version: stored.version,
            next_version: stored.version + 1,
        }
    } else {
        Resolution::Conflict(ConflictRecord::version_mismatch(
            mutation.desktop_id.clone(),
            stored.version,
            mutation.version,
        ))
    }
}
