//! promptsync-core - Core library for promptsync
//!
//! This crate contains the prompt models, the version-checked stores, the
//! sync engine, and the HTTP client shared by the API server and the CLI.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod store;
pub mod sync;
pub mod util;
pub mod validation;

pub use error::{Error, Result};
pub use models::{PromptId, PromptRecord};
pub use sync::SyncEngine;
