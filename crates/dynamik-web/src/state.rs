//! Shared application state for the web server.

use std::path::PathBuf;
use std::sync::Arc;

use dynamik_common::settings::PacingSettings;
use dynamik_experiments::{ExperimentCoordinator, UploadPolicy};

/// Shared state injected into every Axum handler.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: ExperimentCoordinator,
    pub upload: UploadPolicy,
    pub pacing: PacingSettings,
    /// Directory served under `/static`.
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(
        coordinator: ExperimentCoordinator,
        upload: UploadPolicy,
        pacing: PacingSettings,
        static_dir: impl Into<PathBuf>,
    ) -> Self {
        Self { coordinator, upload, pacing, static_dir: static_dir.into() }
    }

    /// Largest request body the upload form may send.
    pub fn body_limit(&self) -> usize {
        let files = self.upload.max_bytes.saturating_mul(self.upload.max_files as u64);
        usize::try_from(files.saturating_add(1024 * 1024)).unwrap_or(usize::MAX)
    }
}

pub type SharedState = Arc<AppState>;
