//! Typed repository over a [`DocumentStore`] for experiment documents.
//!
//! Handles:
//! - `{id}.config.json` / `{id}.result.json` / `{id}.result.{drift}.json`
//! - Content-addressed log uploads (`logs/{sha256}.csv`)
//! - Wizard drafts

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use dynamik_common::ids::content_digest;
use dynamik_common::{DriftDetails, DynamikError, ExecutionStatus, Experiment, Result};

use crate::backend::{DocumentStore, Folder};

pub fn config_file(id: &str) -> String {
    format!("{id}.config.json")
}

pub fn result_file(id: &str) -> String {
    format!("{id}.result.json")
}

pub fn drift_file(id: &str, drift: usize) -> String {
    format!("{id}.result.{drift}.json")
}

fn draft_file(draft: &str) -> String {
    format!("{draft}.json")
}

#[derive(Clone)]
pub struct ExperimentStore {
    backend: Arc<dyn DocumentStore>,
}

impl ExperimentStore {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> Arc<dyn DocumentStore> {
        self.backend.clone()
    }

    // ── Logs ─────────────────────────────────────────────────────────────────

    /// Store an uploaded log under its content digest. Identical uploads map
    /// to the same file. Returns the stored file name.
    pub async fn save_log(&self, content: &[u8]) -> Result<String> {
        let name = format!("{}.csv", content_digest(content));
        let created = self.backend.create_if_absent(Folder::Logs, &name, content).await?;
        tracing::debug!(log = %name, created, bytes = content.len(), "Stored log");
        Ok(name)
    }

    pub async fn read_log(&self, name: &str) -> Result<Vec<u8>> {
        self.backend.read(Folder::Logs, name).await
    }

    // ── Experiment documents ─────────────────────────────────────────────────

    pub async fn experiment_exists(&self, id: &str) -> Result<bool> {
        self.backend.exists(Folder::Results, &config_file(id)).await
    }

    pub async fn create_experiment(&self, experiment: &Experiment) -> Result<bool> {
        self.create_json(Folder::Results, &config_file(&experiment.id), experiment).await
    }

    pub async fn create_status(&self, id: &str, status: &ExecutionStatus) -> Result<bool> {
        self.create_json(Folder::Results, &result_file(id), status).await
    }

    pub async fn read_experiment(&self, id: &str) -> Result<Experiment> {
        self.read_json(Folder::Results, &config_file(id)).await
    }

    /// The worker rewrites this document in place; a partial read is
    /// reported as `NotFound`, like a missing one.
    pub async fn read_status(&self, id: &str) -> Result<ExecutionStatus> {
        self.read_worker_json(&result_file(id)).await
    }

    pub async fn read_drift(&self, id: &str, drift: usize) -> Result<DriftDetails> {
        self.read_worker_json(&drift_file(id, drift)).await
    }

    /// Stored bytes of the status document, for download.
    pub async fn raw_status(&self, id: &str) -> Result<Vec<u8>> {
        self.read_worker_bytes(&result_file(id)).await
    }

    pub async fn raw_drift(&self, id: &str, drift: usize) -> Result<Vec<u8>> {
        self.read_worker_bytes(&drift_file(id, drift)).await
    }

    // ── Drafts ───────────────────────────────────────────────────────────────

    pub async fn save_draft<T: Serialize + Sync>(&self, draft: &str, value: &T) -> Result<()> {
        let content = serde_json::to_vec_pretty(value)?;
        self.backend.put(Folder::Drafts, &draft_file(draft), &content).await
    }

    pub async fn read_draft<T: DeserializeOwned>(&self, draft: &str) -> Result<T> {
        self.read_json(Folder::Drafts, &draft_file(draft)).await
    }

    // ── helpers ──────────────────────────────────────────────────────────────

    async fn create_json<T: Serialize + Sync>(&self, folder: Folder, name: &str, value: &T) -> Result<bool> {
        let content = serde_json::to_vec_pretty(value)?;
        self.backend.create_if_absent(folder, name, &content).await
    }

    async fn read_json<T: DeserializeOwned>(&self, folder: Folder, name: &str) -> Result<T> {
        let content = self.backend.read(folder, name).await?;
        Ok(serde_json::from_slice(&content)?)
    }

    async fn read_worker_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let content = self.backend.read(Folder::Results, name).await?;
        if content.is_empty() {
            tracing::debug!(document = %name, "Result document is empty, worker is writing it");
            return Err(DynamikError::NotFound(format!("{}/{name}", Folder::Results)));
        }
        Ok(content)
    }

    async fn read_worker_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let content = self.read_worker_bytes(name).await?;
        serde_json::from_slice(&content).map_err(|e| {
            tracing::warn!(document = %name, "Unreadable result document: {e}");
            DynamikError::NotFound(format!("{}/{name}", Folder::Results))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FsStore;
    use dynamik_common::{AlgorithmConfiguration, DriftOverview, LogMapping, Status};
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ExperimentStore {
        ExperimentStore::new(Arc::new(FsStore::new(dir.path())))
    }

    #[tokio::test]
    async fn test_status_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let mut status = ExecutionStatus::queued("2024-05-01T10:00:00.000Z");
        status.status.status = Status::Running;
        status.status.progress = 42;
        status.status.current_ref = ["2024-01-01T00:00:00".into(), "2024-01-08T00:00:00".into()];
        status.status.current_run = ["2024-01-08T00:00:00".into(), "2024-01-15T00:00:00".into()];
        status.start_date = Some("2024-05-01T10:00:01+00:00".into());
        status.drifts.push(DriftOverview {
            index: 0,
            experiment: "abc".into(),
            description: "Found a drift".into(),
            reference_window: status.status.current_ref.clone(),
            running_window: status.status.current_run.clone(),
        });

        assert!(store.create_status("abc", &status).await.unwrap());
        let read = store.read_status("abc").await.unwrap();
        assert_eq!(read, status);
    }

    #[tokio::test]
    async fn test_status_is_write_once() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let first = ExecutionStatus::queued("2024-05-01T10:00:00.000Z");
        let second = ExecutionStatus::queued("2030-01-01T00:00:00.000Z");
        assert!(store.create_status("abc", &first).await.unwrap());
        assert!(!store.create_status("abc", &second).await.unwrap());
        assert_eq!(store.read_status("abc").await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_experiment_documents() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let log = store.save_log(b"case,activity\n1,a\n").await.unwrap();
        assert_eq!(log, store.save_log(b"case,activity\n1,a\n").await.unwrap());
        assert!(log.ends_with(".csv"));

        let experiment = Experiment::new(
            String::new(),
            AlgorithmConfiguration::default(),
            LogMapping::default(),
            vec![log],
        )
        .unwrap();

        assert!(!store.experiment_exists(&experiment.id).await.unwrap());
        assert!(store.create_experiment(&experiment).await.unwrap());
        assert!(store.experiment_exists(&experiment.id).await.unwrap());
        assert_eq!(store.read_experiment(&experiment.id).await.unwrap(), experiment);

        // pretty-printed on disk
        let raw = std::fs::read_to_string(dir.path().join("results").join(config_file(&experiment.id))).unwrap();
        assert!(raw.contains("\n  \"id\""));
    }

    #[tokio::test]
    async fn test_missing_drift_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.read_drift("abc", 3).await.unwrap_err().is_not_found());
        assert!(store.raw_status("abc").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_partially_written_results_read_as_not_found() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let backend = store.backend();

        backend.put(Folder::Results, &result_file("abc"), b"").await.unwrap();
        backend.put(Folder::Results, &drift_file("abc", 0), b"{\"index\": 0, \"desc").await.unwrap();

        assert!(store.read_status("abc").await.unwrap_err().is_not_found());
        assert!(store.raw_status("abc").await.unwrap_err().is_not_found());
        assert!(store.read_drift("abc", 0).await.unwrap_err().is_not_found());

        // Drafts are ours: corruption there is still an error.
        backend.put(Folder::Drafts, "d.json", b"{").await.unwrap();
        let err = store.read_draft::<serde_json::Value>("d").await.unwrap_err();
        assert!(matches!(err, DynamikError::Serialization(_)));
    }
}
