//! Sync engine limits.
//!
//! Bounds enforced on upload batches, download pages, and status history.
//! The API builds these from its environment; tests use the defaults.

/// Hard upper bound for a download page.
pub const MAX_DOWNLOAD_LIMIT: usize = 1_000;
/// Page size used when the client does not ask for one.
pub const DEFAULT_DOWNLOAD_LIMIT: usize = 1_000;
/// Hard upper bound for status history.
pub const MAX_HISTORY_LIMIT: usize = 100;
/// History length used when the client does not ask for one.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;
/// Default cap on prompts per upload batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 500;

/// Runtime limits shared by the coordinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncLimits {
    /// Maximum number of prompts accepted in one upload
    pub max_batch_size: usize,
    /// Reported to clients through the status summary
    pub sync_enabled: bool,
}

impl Default for SyncLimits {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            sync_enabled: true,
        }
    }
}

impl SyncLimits {
    #[must_use]
    pub const fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    #[must_use]
    pub const fn with_sync_enabled(mut self, sync_enabled: bool) -> Self {
        self.sync_enabled = sync_enabled;
        self
    }
}
