//! Error types for promptsync-core

use thiserror::Error;

use crate::validation::ValidationErrors;

/// Result type alias using promptsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in promptsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Prompt not found
    #[error("Prompt not found: {0}")]
    NotFound(String),

    /// Request failed validation before touching any store
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationErrors),

    /// Version-checked write lost against the stored version
    #[error("Version conflict for {desktop_id}: stored version is {current_version}")]
    VersionConflict {
        desktop_id: String,
        current_version: i64,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store backend failure that is not a driver error (poisoned lock, corrupt row)
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Whether the error is the expected outcome of an optimistic-version check
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}
