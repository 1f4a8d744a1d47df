//! Data models for promptsync

mod conflict;
mod mutation;
mod prompt;
mod session;

pub use conflict::{ConflictRecord, ConflictType};
pub use mutation::DesktopMutation;
pub use prompt::{normalize_tags, PromptId, PromptRecord};
pub use session::{SessionStatus, SessionTally, SyncSession, SyncSessionSummary};
