use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use promptsync_core::config::{SyncLimits, DEFAULT_MAX_BATCH_SIZE};
use promptsync_core::store::StoreBackend;
use thiserror::Error;

const MIN_JWT_SECRET_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub store: StoreBackend,
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: String,
    pub auth_clock_skew: Duration,
    pub rate_limit_window: Duration,
    pub sync_upload_rate_limit_per_window: u32,
    pub sync_read_rate_limit_per_window: u32,
    pub max_batch_size: usize,
    pub sync_enabled: bool,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("store", &self.store)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_audience", &self.jwt_audience)
            .field("auth_clock_skew", &self.auth_clock_skew)
            .field("rate_limit_window", &self.rate_limit_window)
            .field(
                "sync_upload_rate_limit_per_window",
                &self.sync_upload_rate_limit_per_window,
            )
            .field(
                "sync_read_rate_limit_per_window",
                &self.sync_read_rate_limit_per_window,
            )
            .field("max_batch_size", &self.max_batch_size)
            .field("sync_enabled", &self.sync_enabled)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "PROMPTSYNC_API_BIND_ADDR", "127.0.0.1:8080");

        let store = match value_or_default(&lookup, "PROMPTSYNC_STORE", "memory")
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => StoreBackend::Memory,
            "sqlite" => StoreBackend::Sqlite(PathBuf::from(value_or_default(
                &lookup,
                "PROMPTSYNC_DATABASE_PATH",
                "promptsync.db",
            ))),
            other => {
                return Err(ConfigError::Invalid(format!(
                    "PROMPTSYNC_STORE must be `memory` or `sqlite`, got `{other}`"
                )))
            }
        };

        let jwt_secret = required_trimmed(&lookup, "PROMPTSYNC_JWT_SECRET")?;
        if jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(ConfigError::Invalid(format!(
                "PROMPTSYNC_JWT_SECRET must be at least {MIN_JWT_SECRET_BYTES} bytes"
            )));
        }
        let jwt_issuer = optional_trimmed(&lookup, "PROMPTSYNC_JWT_ISSUER");
        let jwt_audience = value_or_default(&lookup, "PROMPTSYNC_JWT_AUDIENCE", "authenticated");

        let auth_clock_skew_secs = bounded(&lookup, "AUTH_CLOCK_SKEW_SECS", 60, 0, 300)?;
        let rate_limit_window_secs = bounded(&lookup, "RATE_LIMIT_WINDOW_SECS", 60, 10, 3_600)?;
        let sync_upload_rate_limit_per_window =
            bounded(&lookup, "SYNC_UPLOAD_RATE_LIMIT_PER_WINDOW", 30, 1, 1_000)?;
        let sync_read_rate_limit_per_window =
            bounded(&lookup, "SYNC_READ_RATE_LIMIT_PER_WINDOW", 120, 1, 5_000)?;
        let max_batch_size = bounded(
            &lookup,
            "SYNC_MAX_BATCH_SIZE",
            DEFAULT_MAX_BATCH_SIZE as u64,
            1,
            5_000,
        )?;

        let sync_enabled = match value_or_default(&lookup, "SYNC_ENABLED", "true")
            .to_ascii_lowercase()
            .as_str()
        {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => {
                return Err(ConfigError::Invalid(
                    "SYNC_ENABLED must be a boolean".to_string(),
                ))
            }
        };

        Ok(Self {
            bind_addr,
            store,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            auth_clock_skew: Duration::from_secs(auth_clock_skew_secs),
            rate_limit_window: Duration::from_secs(rate_limit_window_secs),
            sync_upload_rate_limit_per_window: narrow(sync_upload_rate_limit_per_window),
            sync_read_rate_limit_per_window: narrow(sync_read_rate_limit_per_window),
            max_batch_size: usize::try_from(max_batch_size).unwrap_or(DEFAULT_MAX_BATCH_SIZE),
            sync_enabled,
        })
    }

    pub fn sync_limits(&self) -> SyncLimits {
        SyncLimits::default()
            .with_max_batch_size(self.max_batch_size)
            .with_sync_enabled(self.sync_enabled)
    }
}

/// Integer variable with a default, checked against `[min, max]`
fn bounded(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    min: u64,
    max: u64,
) -> Result<u64, ConfigError> {
    let value = value_or_default(lookup, name, &default.to_string())
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(format!("{name} must be an integer in [{min}, {max}]")))?;
    if !(min..=max).contains(&value) {
        return Err(ConfigError::Invalid(format!(
            "{name} must be in [{min}, {max}]"
        )));
    }
    Ok(value)
}

fn narrow(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
