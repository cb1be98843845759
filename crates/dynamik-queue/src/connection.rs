//! The process-wide broker connection.

use dynamik_common::settings::BrokerSettings;
use dynamik_common::Result;
use lapin::uri::{AMQPAuthority, AMQPScheme, AMQPUri, AMQPUserInfo};
use lapin::{Channel, Connection, ConnectionProperties};
use secrecy::ExposeSecret;
use tracing::{error, info};

use crate::unavailable;

/// Owned AMQP connection. Reconnection is left to the client library; a
/// dropped connection surfaces as `BackendUnavailable` on the next call.
pub struct BrokerConnection {
    inner: Connection,
}

impl BrokerConnection {
    pub async fn connect(settings: &BrokerSettings) -> Result<Self> {
        let name = format!("client-{}@dynamik", hostname());
        let properties = ConnectionProperties::default().with_connection_name(name.clone().into());

        let inner = Connection::connect_uri(broker_uri(settings), properties)
            .await
            .map_err(|e| {
                error!(host = %settings.host, port = settings.port, "RabbitMQ connection error: {e}");
                unavailable(e)
            })?;

        inner.on_error(|e| error!("RabbitMQ connection error: {e}"));
        info!(connection = %name, host = %settings.host, port = settings.port, "Connected to RabbitMQ");

        Ok(Self { inner })
    }

    pub async fn create_channel(&self) -> Result<Channel> {
        self.inner.create_channel().await.map_err(unavailable)
    }

    pub async fn close(&self) -> Result<()> {
        info!("Closing RabbitMQ connection");
        self.inner.close(200, "shutdown").await.map_err(unavailable)
    }
}

/// Built from fields so credentials need no URL escaping. Default vhost.
fn broker_uri(settings: &BrokerSettings) -> AMQPUri {
    AMQPUri {
        scheme: AMQPScheme::AMQP,
        authority: AMQPAuthority {
            userinfo: AMQPUserInfo {
                username: settings.user.clone(),
                password: settings.password.expose_secret().to_string(),
            },
            host: settings.host.clone(),
            port: settings.port,
        },
        vhost: "/".to_string(),
        query: Default::default(),
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}
