use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use promptsync_core::client::SyncClient;
use promptsync_core::models::{ConflictRecord, PromptRecord, SyncSessionSummary};
use promptsync_core::sync::SyncStatusSummary;
use promptsync_core::util::normalize_text_option;

use crate::error::CliError;
use crate::state::{default_state_path, SyncState};

/// Connection and state settings shared by every command
pub struct CommandContext {
    pub client: SyncClient,
    pub state_path: PathBuf,
}

impl CommandContext {
    pub fn new(
        api_url: Option<String>,
        token: Option<String>,
        state_path: Option<PathBuf>,
    ) -> Result<Self, CliError> {
        let api_url = normalize_text_option(api_url).ok_or(CliError::MissingApiUrl)?;
        let token = normalize_text_option(token).ok_or(CliError::MissingToken)?;
        let state_path = match state_path {
            Some(path) => path,
            None => default_state_path()?,
        };
        Ok(Self {
            client: SyncClient::new(api_url, token)?,
            state_path,
        })
    }

    pub fn api_url(&self) -> &str {
        self.client.base_url()
    }

    pub fn load_state(&self) -> Result<SyncState, CliError> {
        SyncState::load_from_path(&self.state_path)
    }

    pub fn save_state(&self, state: &SyncState) -> Result<(), CliError> {
        state.save_to_path(&self.state_path)
    }
}

pub fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|error| {
        CliError::InvalidUploadFile(format!("Failed to read {}: {error}", path.display()))
    })
}

pub fn format_timestamp(value: Option<DateTime<Utc>>) -> String {
    value.map_or_else(
        || "never".to_string(),
        |at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_prompt_lines(prompts: &[PromptRecord]) -> Vec<String> {
    prompts
        .iter()
        .map(|prompt| {
            let tags = if prompt.tags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", prompt.tags.join(", "))
            };
            format!(
                "{}  v{:<3} {}{}",
                prompt.desktop_id, prompt.version, prompt.title, tags
            )
        })
        .collect()
}

pub fn format_conflict_lines(conflicts: &[ConflictRecord]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  server v{} / local v{}",
                conflict.desktop_id, conflict.web_version, conflict.desktop_version
            )
        })
        .collect()
}

pub fn format_status_lines(status: &SyncStatusSummary) -> Vec<String> {
    vec![
        format!("Last sync:         {}", format_timestamp(status.last_sync)),
        format!("Prompts on server: {}", status.total_prompts),
        format!("Pending conflicts: {}", status.pending_conflicts),
        format!(
            "Last session:      {}",
            status.last_session_id.as_deref().unwrap_or("none")
        ),
        format!(
            "Sync enabled:      {}",
            if status.sync_enabled { "yes" } else { "no" }
        ),
    ]
}

pub fn format_session_lines(sessions: &[SyncSessionSummary]) -> Vec<String> {
    sessions
        .iter()
        .map(|session| {
            format!(
                "{}  {:<24} +{} ~{} !{}  {}",
                format_timestamp(Some(session.completed_at)),
                session.status.as_str(),
                session.uploaded,
                session.updated,
                session.conflicts,
                session.session_id
            )
        })
        .collect()
}
