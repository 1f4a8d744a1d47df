//! Sync session model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Terminal status of one upload round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Completed,
    CompletedWithConflicts,
    Failed,
}

impl SessionStatus {
    /// Status for a run that reached the end of its batch
    #[must_use]
    pub const fn from_conflicts(conflicts: u32) -> Self {
        if conflicts == 0 {
            Self::Completed
        } else {
            Self::CompletedWithConflicts
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::CompletedWithConflicts => "completed_with_conflicts",
            Self::Failed => "failed",
        }
    }

    /// Whether the session counts as a successful sync
    #[must_use]
    pub const fn is_success(self) -> bool {
        !matches!(self, Self::Failed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "completed_with_conflicts" => Ok(Self::CompletedWithConflicts),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown session status `{other}`")),
        }
    }
}

/// Running counts for a session that has not been finalized yet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionTally {
    pub uploaded: u32,
    pub updated: u32,
    pub conflicts: u32,
}

/// One finalized upload round. Immutable once appended to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSession {
    /// Client-supplied correlation id
    pub session_id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Records created
    pub uploaded: u32,
    /// Records updated
    pub updated: u32,
    /// Records refused with a conflict
    pub conflicts: u32,
    pub status: SessionStatus,
}

impl SyncSession {
    #[must_use]
    pub fn finalize(
        user_id: &str,
        session_id: &str,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        tally: SessionTally,
        status: SessionStatus,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            started_at,
            completed_at,
            uploaded: tally.uploaded,
            updated: tally.updated,
            conflicts: tally.conflicts,
            status,
        }
    }
}

/// Session as reported to clients (owner omitted)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSessionSummary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub uploaded: u32,
    pub updated: u32,
    pub conflicts: u32,
    pub status: SessionStatus,
}

impl From<SyncSession> for SyncSessionSummary {
    fn from(session: SyncSession) -> Self {
        Self {
            session_id: session.session_id,
            started_at: session.started_at,
            completed_at: session.completed_at,
            uploaded: session.uploaded,
            updated: session.updated,
            conflicts: session.conflicts,
            status: session.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_from_conflicts() {
        assert_eq!(SessionStatus::from_conflicts(0), SessionStatus::Completed);
        assert_eq!(
            SessionStatus::from_conflicts(3),
            SessionStatus::CompletedWithConflicts
        );
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            SessionStatus::Completed,
            SessionStatus::CompletedWithConflicts,
            SessionStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
        assert!("done".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn status_serializes_like_as_str() {
        let json = serde_json::to_string(&SessionStatus::CompletedWithConflicts).unwrap();
        assert_eq!(json, "\"completed_with_conflicts\"");
    }
}
