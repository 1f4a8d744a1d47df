//! Prompt sync engine.
//!
//! Desktop clients push batches of [`DesktopMutation`]s tagged with the
//! version they were based on, and pull back what changed on the server.
//! Every write is version-checked by the store; a stale version becomes a
//! conflict in the upload summary instead of an overwrite.
//!
//! [`DesktopMutation`]: crate::models::DesktopMutation

mod clock;
mod download;
mod resolver;
mod status;
mod upload;


use std::sync::Arc;

use crate::config::SyncLimits;
use crate::error::Result;
use crate::store::{InMemoryStore, PromptStore, SessionLedger, Stores};

pub use clock::{Clock, ManualClock, SystemClock};
pub use download::{DownloadCoordinator, DownloadPage, DownloadParams, DownloadRequest};
pub use resolver::{resolve, Resolution};
pub use status::{StatusParams, StatusReport, StatusReporter, StatusRequest, SyncStatusSummary};
pub use upload::{
    DesktopMutationInput, UploadCoordinator, UploadRequest, UploadSummary, ValidatedUpload,
};

/// Entry point shared by every transport. Cheap to clone.
#[derive(Clone)]
pub struct SyncEngine {
    prompts: Arc<dyn PromptStore>,
    sessions: Arc<dyn SessionLedger>,
    clock: Arc<dyn Clock>,
    limits: SyncLimits,
}

impl SyncEngine {
    pub fn new(
        prompts: Arc<dyn PromptStore>,
        sessions: Arc<dyn SessionLedger>,
        clock: Arc<dyn Clock>,
        limits: SyncLimits,
    ) -> Self {
        Self {
            prompts,
            sessions,
            clock,
            limits,
        }
    }

    /// Engine over opened [`Stores`] using the system clock
    pub fn from_stores(stores: Stores, limits: SyncLimits) -> Self {
        Self::new(
            stores.prompts,
            stores.sessions,
            Arc::new(SystemClock::new()),
            limits,
        )
    }

    /// Ephemeral engine with default limits
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::new(
            store.clone(),
            store,
            Arc::new(SystemClock::new()),
            SyncLimits::default(),
        )
    }

    #[must_use]
    pub const fn limits(&self) -> SyncLimits {
        self.limits
    }

    /// Validate and apply a desktop batch for `user_id`
    pub fn upload(&self, user_id: &str, request: UploadRequest) -> Result<UploadSummary> {
        let upload = request.validate(&self.limits)?;
        UploadCoordinator::new(&*self.prompts, &*self.sessions, &*self.clock)
            .sync_from_desktop(user_id, upload)
    }

    pub fn download(&self, user_id: &str, params: &DownloadParams) -> Result<DownloadPage> {
        let request = params.validate()?;
        DownloadCoordinator::new(&*self.prompts, &*self.clock).download(user_id, request)
    }

    pub fn status(&self, user_id: &str, params: &StatusParams) -> Result<StatusReport> {
        let request = params.validate()?;
        StatusReporter::new(&*self.prompts, &*self.sessions, self.limits).status(user_id, request)
    }
}
