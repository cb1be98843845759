//! Job dispatch onto the durable experiments queue.

use async_trait::async_trait;
use dynamik_common::{DynamikError, Experiment, Result};
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel};
use tracing::{debug, info, instrument};

use crate::connection::BrokerConnection;
use crate::unavailable;

/// Hands experiments to the out-of-process worker. Success means the broker
/// has durably accepted the message. No retries.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn publish(&self, experiment: &Experiment) -> Result<()>;
}

/// Publishes to a single durable queue through the default exchange.
pub struct AmqpDispatcher {
    channel: Channel,
    queue: String,
}

impl AmqpDispatcher {
    /// Open a confirm-mode channel and make sure the queue exists.
    pub async fn new(connection: &BrokerConnection, queue: &str) -> Result<Self> {
        let channel = connection.create_channel().await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(unavailable)?;
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await
            .map_err(unavailable)?;

        info!(queue, "Experiment queue ready");
        Ok(Self { channel, queue: queue.to_string() })
    }
}

#[async_trait]
impl JobDispatcher for AmqpDispatcher {
    #[instrument(skip(self, experiment), fields(experiment_id = %experiment.id))]
    async fn publish(&self, experiment: &Experiment) -> Result<()> {
        let body = serde_json::to_vec(experiment)?;
        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2);

        let confirmation = self
            .channel
            .basic_publish("", &self.queue, BasicPublishOptions::default(), &body, properties)
            .await
            .map_err(unavailable)?
            .await
            .map_err(unavailable)?;

        match confirmation {
            Confirmation::Nack(_) => Err(DynamikError::BackendUnavailable(format!(
                "broker refused experiment {}",
                experiment.id
            ))),
            _ => {
                debug!(queue = %self.queue, bytes = body.len(), "Experiment published");
                Ok(())
            }
        }
    }
}
