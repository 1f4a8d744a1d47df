//! Desktop upload: validation and the per-record write loop

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::clock::Clock;
use super::resolver::{resolve, Resolution};
use crate::config::SyncLimits;
use crate::error::{Error, Result};
use crate::models::{
    normalize_tags, ConflictRecord, DesktopMutation, SessionStatus, SessionTally, SyncSession,
};
use crate::store::{PromptStore, SessionLedger};
use crate::util::{normalize_text_option, user_fingerprint};
use crate::validation::{parse_timestamp, ValidationErrors};

const MAX_DESKTOP_ID_CHARS: usize = 128;
const MAX_SESSION_ID_CHARS: usize = 128;
const MAX_TITLE_CHARS: usize = 200;
const MAX_QUICK_ACCESS_KEY_CHARS: usize = 32;
const MAX_TAGS: usize = 50;
const MAX_TAG_CHARS: usize = 50;

/// One prompt as it arrives on the wire, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopMutationInput {
    pub desktop_id: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub quick_access_key: Option<String>,
    pub version: i64,
    pub last_modified: String,
}

/// Body of an upload request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    pub prompts: Vec<DesktopMutationInput>,
    #[serde(default)]
    pub sync_session_id: String,
}

/// An upload that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpload {
    pub session_id: String,
    pub mutations: Vec<DesktopMutation>,
}

/// Outcome reported to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    /// Records created
    pub uploaded: u32,
    /// Records updated
    pub updated: u32,
    pub conflicts: Vec<ConflictRecord>,
    pub session_id: String,
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

impl DesktopMutationInput {
    fn validate(self, index: usize, errors: &mut ValidationErrors) -> Option<DesktopMutation> {
        let path = |field: &str| format!("prompts[{index}].{field}");
        let before = errors.len();

        let desktop_id = self.desktop_id.trim().to_string();
        if desktop_id.is_empty() {
            errors.push(path("desktop_id"), "must not be empty");
        } else if char_len(&desktop_id) > MAX_DESKTOP_ID_CHARS {
            errors.push(
                path("desktop_id"),
                format!("must be at most {MAX_DESKTOP_ID_CHARS} characters"),
            );
        }

        let title = self.title.trim().to_string();
        if title.is_empty() {
            errors.push(path("title"), "must not be empty");
        } else if char_len(&title) > MAX_TITLE_CHARS {
            errors.push(
                path("title"),
                format!("must be at most {MAX_TITLE_CHARS} characters"),
            );
        }

        if self.content.trim().is_empty() {
            errors.push(path("content"), "must not be empty");
        }

        if self.version < 1 {
            errors.push(path("version"), "must be >= 1");
        }

        let last_modified =
            errors.capture(parse_timestamp(&path("last_modified"), &self.last_modified));

        let quick_access_key = normalize_text_option(self.quick_access_key);
        if quick_access_key
            .as_deref()
            .is_some_and(|key| char_len(key) > MAX_QUICK_ACCESS_KEY_CHARS)
        {
            errors.push(
                path("quick_access_key"),
                format!("must be at most {MAX_QUICK_ACCESS_KEY_CHARS} characters"),
            );
        }

        if self.tags.len() > MAX_TAGS {
            errors.push(path("tags"), format!("must hold at most {MAX_TAGS} tags"));
        }
        for (tag_index, tag) in self.tags.iter().enumerate() {
            if char_len(tag.trim()) > MAX_TAG_CHARS {
                errors.push(
                    format!("prompts[{index}].tags[{tag_index}]"),
                    format!("must be at most {MAX_TAG_CHARS} characters"),
                );
            }
        }

        if errors.len() > before {
            return None;
        }

        Some(DesktopMutation {
            desktop_id,
            title,
            content: self.content,
            tags: normalize_tags(self.tags),
            is_public: self.is_public,
            quick_access_key,
            version: self.version,
            last_modified: last_modified?,
        })
    }
}

impl UploadRequest {
    /// Check the whole batch, reporting every violation at once
    pub fn validate(
        self,
        limits: &SyncLimits,
    ) -> std::result::Result<ValidatedUpload, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let session_id = self.sync_session_id.trim().to_string();
        if session_id.is_empty() {
            errors.push("sync_session_id", "must not be empty");
        } else if char_len(&session_id) > MAX_SESSION_ID_CHARS {
            errors.push(
                "sync_session_id",
                format!("must be at most {MAX_SESSION_ID_CHARS} characters"),
            );
        }

        if self.prompts.len() > limits.max_batch_size {
            errors.push(
                "prompts",
                format!("must hold at most {} prompts", limits.max_batch_size),
            );
            return Err(errors);
        }

        let mutations: Vec<DesktopMutation> = self
            .prompts
            .into_iter()
            .enumerate()
            .filter_map(|(index, input)| input.validate(index, &mut errors))
            .collect();

        errors.finish(ValidatedUpload {
            session_id,
            mutations,
        })
    }
}

enum Outcome {
    Created,
    Updated,
    Conflict(ConflictRecord),
}

/// Runs one validated upload against the stores
pub struct UploadCoordinator<'a> {
    prompts: &'a dyn PromptStore,
    sessions: &'a dyn SessionLedger,
    clock: &'a dyn Clock,
}

impl<'a> UploadCoordinator<'a> {
    pub fn new(
        prompts: &'a dyn PromptStore,
        sessions: &'a dyn SessionLedger,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            prompts,
            sessions,
            clock,
        }
    }

    /// Process every mutation in order, then append one session.
    ///
    /// Conflicts never stop the batch. A store error does: the counts so far
    /// are recorded as a `failed` session and the error is returned.
    pub fn sync_from_desktop(
        &self,
        user_id: &str,
        upload: ValidatedUpload,
    ) -> Result<UploadSummary> {
        let started_at = self.clock.now();
        let mut tally = SessionTally::default();
        let mut conflicts = Vec::new();

        for mutation in &upload.mutations {
            match self.apply(user_id, mutation) {
                Ok(Outcome::Created) => tally.uploaded += 1,
                Ok(Outcome::Updated) => tally.updated += 1,
                Ok(Outcome::Conflict(conflict)) => {
                    tally.conflicts += 1;
                    conflicts.push(conflict);
                }
                Err(error) => {
                    self.record_failure(user_id, &upload.session_id, started_at, tally, &error);
                    return Err(error);
                }
            }
        }

        let status = SessionStatus::from_conflicts(tally.conflicts);
        let session = SyncSession::finalize(
            user_id,
            &upload.session_id,
            started_at,
            self.clock.now(),
            tally,
            status,
        );
        self.sessions.append(&session)?;

        tracing::info!(
            user = user_fingerprint(user_id),
            session = %upload.session_id,
            uploaded = tally.uploaded,
            updated = tally.updated,
            conflicts = tally.conflicts,
            status = %status,
            "Desktop upload processed"
        );

        Ok(UploadSummary {
            uploaded: tally.uploaded,
            updated: tally.updated,
            conflicts,
            session_id: upload.session_id,
        })
    }

    fn apply(&self, user_id: &str, mutation: &DesktopMutation) -> Result<Outcome> {
        let stored = self
            .prompts
            .find_by_desktop_id(user_id, &mutation.desktop_id)?;

        match resolve(mutation, stored.as_ref()) {
            Resolution::Create => self.create(user_id, mutation),
            Resolution::Update {
                expected_version, ..
            } => match self
                .prompts
                .update(user_id, mutation, expected_version, self.clock)
            {
                Ok(_) => Ok(Outcome::Updated),
                Err(Error::VersionConflict {
                    current_version, ..
                }) => Ok(lost_race(mutation, current_version)),
                // Gone since the read: the create rule applies
                Err(Error::NotFound(_)) => self.create(user_id, mutation),
                Err(error) => Err(error),
            },
            Resolution::Conflict(conflict) => Ok(Outcome::Conflict(conflict)),
        }
    }

    fn create(&self, user_id: &str, mutation: &DesktopMutation) -> Result<Outcome> {
        match self.prompts.create(user_id, mutation, self.clock) {
            Ok(_) => Ok(Outcome::Created),
            Err(Error::VersionConflict {
                current_version, ..
            }) => Ok(lost_race(mutation, current_version)),
            Err(error) => Err(error),
        }
    }

    fn record_failure(
        &self,
        user_id: &str,
        session_id: &str,
        started_at: DateTime<Utc>,
        tally: SessionTally,
        error: &Error,
    ) {
        tracing::error!(
            user = user_fingerprint(user_id),
            session = %session_id,
            error = %error,
            "Desktop upload failed"
        );
        let session = SyncSession::finalize(
            user_id,
            session_id,
            started_at,
            self.clock.now(),
            tally,
            SessionStatus::Failed,
        );
        if let Err(append_error) = self.sessions.append(&session) {
            tracing::warn!(
                session = %session_id,
                error = %append_error,
                "Could not record failed session"
            );
        }
    }
}

fn lost_race(mutation: &DesktopMutation, current_version: i64) -> Outcome {
    tracing::debug!(
        desktop_id = %mutation.desktop_id,
        current_version,
        "Write lost a version race"
    );
    Outcome::Conflict(ConflictRecord::version_mismatch(
        mutation.desktop_id.clone(),
        current_version,
        mutation.version,
    ))
}
