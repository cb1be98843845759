//! In-process broker used by tests and broker-less local runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::debug;

use dynamik_common::{DynamikError, ExecutionStatus, Experiment, Result};

use crate::dispatcher::JobDispatcher;
use crate::live::{StatusChannel, StatusSubscription};

const STATUS_CAPACITY: usize = 256;

/// Records published jobs and fans status messages out to subscribers by
/// routing key.
pub struct MemoryBroker {
    jobs: Mutex<Vec<Experiment>>,
    status_tx: broadcast::Sender<(String, Vec<u8>)>,
    offline: AtomicBool,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        let (status_tx, _) = broadcast::channel(STATUS_CAPACITY);
        Self { jobs: Mutex::new(Vec::new()), status_tx, offline: AtomicBool::new(false) }
    }

    /// Experiments published so far, oldest first.
    pub fn jobs(&self) -> Vec<Experiment> {
        self.jobs.lock().map(|jobs| jobs.clone()).unwrap_or_default()
    }

    /// Refuse every publish and subscribe until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of live subscriptions currently attached.
    pub fn subscriber_count(&self) -> usize {
        self.status_tx.receiver_count()
    }

    /// Push an arbitrary payload to the subscribers of `routing_key`.
    pub fn send_raw(&self, routing_key: &str, body: impl Into<Vec<u8>>) {
        // No receivers is not an error: nobody is watching.
        let _ = self.status_tx.send((routing_key.to_string(), body.into()));
    }

    /// Stand in for the worker: publish a status snapshot for `experiment_id`.
    pub fn publish_status(&self, experiment_id: &str, status: &ExecutionStatus) -> Result<()> {
        self.send_raw(experiment_id, serde_json::to_vec(status)?);
        Ok(())
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(DynamikError::BackendUnavailable("broker is offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl JobDispatcher for MemoryBroker {
    async fn publish(&self, experiment: &Experiment) -> Result<()> {
        self.check_online()?;
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.push(experiment.clone());
        }
        debug!(experiment_id = %experiment.id, "Experiment queued in memory");
        Ok(())
    }
}

#[async_trait]
impl StatusChannel for MemoryBroker {
    async fn subscribe(&self, experiment_id: &str) -> Result<StatusSubscription> {
        self.check_online()?;
        let id = experiment_id.to_string();
        let stream = BroadcastStream::new(self.status_tx.subscribe()).filter_map(move |msg| match msg {
            Ok((key, body)) if key == id => Some(body),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(n)) => {
                debug!(experiment_id = %id, skipped = n, "Live subscriber lagged");
                None
            }
        });
        Ok(StatusSubscription::new(Box::pin(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynamik_common::{AlgorithmConfiguration, LogMapping, Status};
    use std::time::Duration;

    fn experiment() -> Experiment {
        Experiment::new(
            "someone@example.com".into(),
            AlgorithmConfiguration::default(),
            LogMapping::default(),
            vec!["log.csv".into()],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_publish_records_jobs() {
        let broker = MemoryBroker::new();
        let experiment = experiment();
        broker.publish(&experiment).await.unwrap();
        assert_eq!(broker.jobs(), vec![experiment]);
    }

    #[tokio::test]
    async fn test_offline_broker_is_unavailable() {
        let broker = MemoryBroker::new();
        broker.set_offline(true);
        let err = broker.publish(&experiment()).await.unwrap_err();
        assert!(matches!(err, DynamikError::BackendUnavailable(_)));
        assert!(broker.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_subscription_filters_by_routing_key() {
        let broker = MemoryBroker::new();
        let mut sub = broker.subscribe("mine").await.unwrap();

        let mut status = ExecutionStatus::queued("2024-05-01T10:00:00.000Z");
        broker.publish_status("other", &status).unwrap();
        status.status.status = Status::Running;
        broker.publish_status("mine", &status).unwrap();

        let body = tokio::time::timeout(Duration::from_secs(1), sub.next())
            .await
            .unwrap()
            .unwrap();
        let received: ExecutionStatus = serde_json::from_slice(&body).unwrap();
        assert_eq!(received.status.status, Status::Running);
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_no_history() {
        let broker = MemoryBroker::new();
        broker.send_raw("mine", "early");
        let mut sub = broker.subscribe("mine").await.unwrap();
        broker.send_raw("mine", "late");

        let body = sub.next().await.unwrap();
        assert_eq!(body, b"late");
    }

    #[tokio::test]
    async fn test_drop_releases_subscription() {
        let broker = MemoryBroker::new();
        let sub = broker.subscribe("mine").await.unwrap();
        assert_eq!(broker.subscriber_count(), 1);
        drop(sub);
        assert_eq!(broker.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_on_drop_runs_once() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sub = StatusSubscription::new(Box::pin(futures_util::stream::empty()))
            .on_drop(move || {
                let _ = tx.send(());
            });
        drop(sub);
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }
}
