//! Sync status summary and session history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{SyncLimits, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};
use crate::error::Result;
use crate::models::SyncSessionSummary;
use crate::store::{PromptStore, SessionLedger};
use crate::validation::{parse_bounded, parse_flag, ValidationErrors};

/// Raw query string values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRequest {
    pub include_history: bool,
    pub history_limit: usize,
}

impl Default for StatusRequest {
    fn default() -> Self {
        Self {
            include_history: false,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl StatusParams {
    pub fn validate(&self) -> std::result::Result<StatusRequest, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let include_history = errors.capture(parse_flag("history", self.history.as_deref()));
        let history_limit = errors.capture(parse_bounded(
            "limit",
            self.limit.as_deref(),
            DEFAULT_HISTORY_LIMIT,
            1,
            MAX_HISTORY_LIMIT,
        ));
        errors.finish(StatusRequest {
            include_history: include_history.unwrap_or_default(),
            history_limit: history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
        })
    }
}

/// Per-user sync health
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatusSummary {
    /// Completion time of the latest session that did not fail
    pub last_sync: Option<DateTime<Utc>>,
    pub total_prompts: usize,
    /// Conflicted sessions since the last clean one
    pub pending_conflicts: usize,
    pub last_session_id: Option<String>,
    pub sync_enabled: bool,
    pub is_online: bool,
}

/// Status response body: the bare summary, or the summary with history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusReport {
    WithHistory {
        status: SyncStatusSummary,
        history: Vec<SyncSessionSummary>,
    },
    Summary(SyncStatusSummary),
}

impl StatusReport {
    #[must_use]
    pub const fn summary(&self) -> &SyncStatusSummary {
        match self {
            Self::WithHistory { status, .. } | Self::Summary(status) => status,
        }
    }

    #[must_use]
    pub fn history(&self) -> Option<&[SyncSessionSummary]> {
        match self {
            Self::WithHistory { history, .. } => Some(history),
            Self::Summary(_) => None,
        }
    }
}

pub struct StatusReporter<'a> {
    prompts: &'a dyn PromptStore,
    sessions: &'a dyn SessionLedger,
    limits: SyncLimits,
}

impl<'a> StatusReporter<'a> {
    pub fn new(
        prompts: &'a dyn PromptStore,
        sessions: &'a dyn SessionLedger,
        limits: SyncLimits,
    ) -> Self {
        Self {
            prompts,
            sessions,
            limits,
        }
    }

    pub fn status(&self, user_id: &str, request: StatusRequest) -> Result<StatusReport> {
        let last_sync = self
            .sessions
            .last_successful(user_id)?
            .map(|session| session.completed_at);
        let last_session_id = self
            .sessions
            .recent(user_id, 1)?
            .into_iter()
            .next()
            .map(|session| session.session_id);

        let summary = SyncStatusSummary {
            last_sync,
            total_prompts: self.prompts.count_by_user_id(user_id)?,
            pending_conflicts: self.sessions.pending_conflict_sessions(user_id)?,
            last_session_id,
            sync_enabled: self.limits.sync_enabled,
            is_online: true,
        };

        if !request.include_history {
            return Ok(StatusReport::Summary(summary));
        }

        let history = self
            .sessions
            .recent(user_id, request.history_limit)?
            .into_iter()
            .map(SyncSessionSummary::from)
            .collect();
        Ok(StatusReport::WithHistory {
            status: summary,
            history,
        })
    }
}
