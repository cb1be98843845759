//! Experiment lifecycle: upload → submission → status → results.
//!
//! The coordinator never changes an experiment's state. The worker reports
//! transitions; the coordinator writes the initial `queued` document and
//! relays whatever comes after it.

use std::sync::Arc;

use futures_util::future::ready;
use futures_util::stream::{Stream, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use dynamik_common::{
    AlgorithmConfiguration, DriftDetails, DynamikError, ExecutionStatus, Experiment, LogMapping,
    Result,
};
use dynamik_queue::{JobDispatcher, StatusChannel};
use dynamik_store::ExperimentStore;

use crate::draft::StoredLog;
use crate::upload::UploadedFile;

#[derive(Clone)]
pub struct ExperimentCoordinator {
    store: ExperimentStore,
    dispatcher: Arc<dyn JobDispatcher>,
    live: Arc<dyn StatusChannel>,
}

impl ExperimentCoordinator {
    pub fn new(
        store: ExperimentStore,
        dispatcher: Arc<dyn JobDispatcher>,
        live: Arc<dyn StatusChannel>,
    ) -> Self {
        Self { store, dispatcher, live }
    }

    pub fn store(&self) -> &ExperimentStore {
        &self.store
    }

    // ── Upload ───────────────────────────────────────────────────────────────

    /// Store already-checked uploads, content-addressed.
    pub async fn store_logs(&self, files: &[UploadedFile]) -> Result<Vec<StoredLog>> {
        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            let name = self.store.save_log(&file.content).await?;
            info!(upload = %file.name, stored = %name, bytes = file.content.len(), "Log uploaded");
            stored.push(StoredLog { name: file.name.clone(), file: name });
        }
        Ok(stored)
    }

    // ── Submission ───────────────────────────────────────────────────────────

    /// Submit an experiment and return its id.
    ///
    /// Identical inputs produce the same id. When that id already has a
    /// stored configuration nothing is written and nothing is queued.
    /// Otherwise the queued status, the configuration and the job message
    /// are issued concurrently and must all succeed; a partial failure is
    /// returned as-is, with no rollback.
    #[instrument(skip_all, fields(logs = logs.len()))]
    pub async fn submit(
        &self,
        logs: Vec<String>,
        mapping: LogMapping,
        config: AlgorithmConfiguration,
        email: String,
    ) -> Result<String> {
        if logs.is_empty() {
            return Err(DynamikError::validation(
                "Invalid experiment",
                "Upload at least one log file before submitting",
            ));
        }
        mapping.validate()?;
        config.validate()?;

        let experiment = Experiment::new(email, config, mapping, logs)?;
        let id = experiment.id.clone();

        if self.store.experiment_exists(&id).await? {
            info!(experiment_id = %id, "Experiment already submitted, not queuing again");
            return Ok(id);
        }

        let queued = ExecutionStatus::queued(&experiment.submitted);
        let result = tokio::try_join!(
            self.store.create_status(&id, &queued),
            self.store.create_experiment(&experiment),
            self.dispatcher.publish(&experiment),
        );

        match result {
            Ok((status_created, config_created, ())) => {
                if !(status_created && config_created) {
                    debug!(experiment_id = %id, "Concurrent submission already wrote some documents");
                }
                info!(experiment_id = %id, "Experiment submitted");
                Ok(id)
            }
            Err(e) => {
                error!(experiment_id = %id, "Experiment submission incomplete: {e}");
                Err(e)
            }
        }
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub async fn get_status(&self, id: &str) -> Result<ExecutionStatus> {
        self.store.read_status(id).await
    }

    pub async fn get_experiment(&self, id: &str) -> Result<Experiment> {
        self.store.read_experiment(id).await
    }

    pub async fn get_drift(&self, id: &str, drift: usize) -> Result<DriftDetails> {
        self.store.read_drift(id, drift).await
    }

    pub async fn raw_status(&self, id: &str) -> Result<Vec<u8>> {
        self.store.raw_status(id).await
    }

    pub async fn raw_drift(&self, id: &str, drift: usize) -> Result<Vec<u8>> {
        self.store.raw_drift(id, drift).await
    }

    // ── Live ─────────────────────────────────────────────────────────────────

    /// Status snapshots for `id` as the worker reports them. Unparseable
    /// messages are logged and skipped. Dropping the stream unsubscribes.
    pub async fn stream_status(
        &self,
        id: &str,
    ) -> Result<impl Stream<Item = ExecutionStatus> + Send + Unpin + 'static> {
        let subscription = self.live.subscribe(id).await?;
        debug!(experiment_id = %id, "Live status stream opened");

        let id = id.to_string();
        Ok(subscription.filter_map(move |body| {
            let status = match serde_json::from_slice::<ExecutionStatus>(&body) {
                Ok(status) => Some(status),
                Err(e) => {
                    let err = DynamikError::Stream(e.to_string());
                    warn!(experiment_id = %id, bytes = body.len(), "Dropping live message: {err}");
                    None
                }
            };
            ready(status)
        }))
    }
}
