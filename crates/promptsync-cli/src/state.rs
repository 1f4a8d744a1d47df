//! Persistent per-server sync state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CliError;

const STATE_FILE_NAME: &str = "sync-state.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncState {
    #[serde(default = "default_state_version")]
    pub version: u32,
    /// Keyed by normalized API base URL
    #[serde(default)]
    pub servers: BTreeMap<String, ServerState>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerState {
    /// `syncTimestamp` of the last complete pull
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_session_id: Option<String>,
}

const fn default_state_version() -> u32 {
    1
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            version: default_state_version(),
            servers: BTreeMap::new(),
        }
    }
}

pub fn default_state_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("promptsync").join(STATE_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve data directory".to_string()))
}

impl SyncState {
    pub fn load_from_path(path: &Path) -> Result<Self, CliError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            CliError::State(format!("Failed to read {}: {error}", path.display()))
        })?;
        serde_json::from_str::<Self>(&raw).map_err(|error| {
            CliError::State(format!("Failed to parse {}: {error}", path.display()))
        })
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), CliError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                CliError::State(format!(
                    "Failed to create state directory {}: {error}",
                    parent.display()
                ))
            })?;
        }

        let serialized = serde_json::to_string_pretty(self)?;
        std::fs::write(path, serialized).map_err(|error| {
            CliError::State(format!("Failed to write {}: {error}", path.display()))
        })
    }

    pub fn server(&self, api_url: &str) -> Option<&ServerState> {
        self.servers.get(api_url)
    }

    pub fn watermark(&self, api_url: &str) -> Option<DateTime<Utc>> {
        self.server(api_url).and_then(|server| server.last_sync)
    }

    pub fn record_pull(&mut self, api_url: &str, sync_timestamp: DateTime<Utc>) {
        self.servers
            .entry(api_url.to_string())
            .or_default()
            .last_sync = Some(sync_timestamp);
    }

    pub fn record_upload(&mut self, api_url: &str, session_id: &str) {
        self.servers
            .entry(api_url.to_string())
            .or_default()
            .last_session_id = Some(session_id.to_string());
    }
}
