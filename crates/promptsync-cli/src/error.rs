use std::io;

use promptsync_core::client::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] promptsync_core::Error),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid upload file: {0}")]
    InvalidUploadFile(String),
    #[error("Sync state error: {0}")]
    State(String),
    #[error("No API URL configured. Pass --api-url or set PROMPTSYNC_API_URL.")]
    MissingApiUrl,
    #[error("No access token configured. Pass --token or set PROMPTSYNC_ACCESS_TOKEN.")]
    MissingToken,
}
