//! Live status channel.
//!
//! The worker publishes status snapshots to a direct exchange, routed by
//! experiment id. Each viewer gets its own exclusive, auto-deleting queue
//! bound to that routing key. Delivery is at-most-once and nothing is
//! replayed: a viewer that connects late only sees later updates.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_util::stream::{BoxStream, Stream, StreamExt};
use lapin::options::{BasicConsumeOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Consumer, ExchangeKind};
use tracing::{debug, info, warn};
use uuid::Uuid;

use dynamik_common::Result;

use crate::connection::BrokerConnection;
use crate::unavailable;

#[async_trait]
pub trait StatusChannel: Send + Sync {
    /// Start receiving raw status payloads for one experiment. Dropping the
    /// subscription releases its broker resources.
    async fn subscribe(&self, experiment_id: &str) -> Result<StatusSubscription>;
}

/// A stream of raw message bodies. Runs `on_drop` once when the viewer goes away.
pub struct StatusSubscription {
    stream: BoxStream<'static, Vec<u8>>,
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl StatusSubscription {
    pub fn new(stream: BoxStream<'static, Vec<u8>>) -> Self {
        Self { stream, on_drop: None }
    }

    pub fn on_drop(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_drop = Some(Box::new(f));
        self
    }
}

impl Stream for StatusSubscription {
    type Item = Vec<u8>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Vec<u8>>> {
        self.stream.poll_next_unpin(cx)
    }
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f();
        }
    }
}

impl std::fmt::Debug for StatusSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusSubscription").finish_non_exhaustive()
    }
}

// ── AMQP ────────────────────────────────────────────────────────────────────

/// Read side of the status exchange. Snapshots are published by the worker.
pub struct AmqpStatusChannel {
    connection: Arc<BrokerConnection>,
    exchange: String,
}

impl AmqpStatusChannel {
    pub async fn new(connection: Arc<BrokerConnection>, exchange: &str) -> Result<Self> {
        let channel = connection.create_channel().await?;
        let declared = declare_exchange(&channel, exchange).await;
        close_channel(channel, "exchange declared").await;
        declared?;
        info!(exchange, "Status exchange ready");
        Ok(Self { connection, exchange: exchange.to_string() })
    }

    /// Declare a private queue bound to `experiment_id` and start consuming it.
    async fn consume(&self, channel: &Channel, queue: &str, experiment_id: &str) -> Result<Consumer> {
        declare_exchange(channel, &self.exchange).await?;
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions { exclusive: true, auto_delete: true, ..Default::default() },
                FieldTable::default(),
            )
            .await
            .map_err(unavailable)?;
        channel
            .queue_bind(
                queue,
                &self.exchange,
                experiment_id,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(unavailable)?;

        channel
            .basic_consume(
                queue,
                &format!("viewer-{}", Uuid::new_v4().simple()),
                BasicConsumeOptions { no_ack: true, exclusive: true, ..Default::default() },
                FieldTable::default(),
            )
            .await
            .map_err(unavailable)
    }
}

async fn declare_exchange(channel: &Channel, exchange: &str) -> Result<()> {
    channel
        .exchange_declare(
            exchange,
            ExchangeKind::Direct,
            ExchangeDeclareOptions { durable: true, ..Default::default() },
            FieldTable::default(),
        )
        .await
        .map_err(unavailable)
}

async fn close_channel(channel: Channel, reason: &str) {
    // A channel the broker already closed has nothing left to release.
    if !channel.status().connected() {
        return;
    }
    if let Err(e) = channel.close(200, reason).await {
        warn!(channel = channel.id(), "Failed to close channel: {e}");
    }
}

#[async_trait]
impl StatusChannel for AmqpStatusChannel {
    async fn subscribe(&self, experiment_id: &str) -> Result<StatusSubscription> {
        let channel = self.connection.create_channel().await?;
        let queue = format!("{}:live@dynamik", Uuid::new_v4());

        let consumer = match self.consume(&channel, &queue, experiment_id).await {
            Ok(consumer) => consumer,
            Err(e) => {
                close_channel(channel, "subscription failed").await;
                return Err(e);
            }
        };

        debug!(experiment_id, queue = %queue, "Live subscription opened");

        let id = experiment_id.to_string();
        let stream = consumer.filter_map(move |delivery| {
            let body = match delivery {
                Ok(delivery) => Some(delivery.data),
                Err(e) => {
                    warn!(experiment_id = %id, "Live consumer error: {e}");
                    None
                }
            };
            futures_util::future::ready(body)
        });

        Ok(StatusSubscription::new(stream.boxed()).on_drop(move || {
            let Ok(handle) = tokio::runtime::Handle::try_current() else {
                return;
            };
            handle.spawn(async move {
                close_channel(channel, "viewer disconnected").await;
                debug!(queue = %queue, "Live subscription closed");
            });
        }))
    }
}
