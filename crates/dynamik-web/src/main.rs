//! dynamik web server
//!
//! Run with: cargo run -p dynamik-web

use std::sync::Arc;

use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dynamik_common::settings::BrokerBackend;
use dynamik_common::Settings;
use dynamik_experiments::{ExperimentCoordinator, UploadPolicy};
use dynamik_queue::{AmqpDispatcher, AmqpStatusChannel, BrokerConnection, JobDispatcher, MemoryBroker, StatusChannel};
use dynamik_store::{ExperimentStore, FsStore};
use dynamik_web::{router::build_router, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("dynamik=debug,info")),
        )
        .init();

    info!("Starting dynamik {}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load()?;
    let documents = FsStore::new(&settings.storage.base_path);
    info!(path = %documents.base().display(), "Document store ready");
    let store = ExperimentStore::new(Arc::new(documents));

    let (connection, dispatcher, live): (Option<Arc<BrokerConnection>>, Arc<dyn JobDispatcher>, Arc<dyn StatusChannel>) =
        match settings.broker.backend {
            BrokerBackend::Amqp => {
                let connection = Arc::new(BrokerConnection::connect(&settings.broker).await?);
                let dispatcher = AmqpDispatcher::new(&connection, &settings.broker.experiments_queue).await?;
                let live = AmqpStatusChannel::new(connection.clone(), &settings.broker.status_exchange).await?;
                (Some(connection), Arc::new(dispatcher), Arc::new(live))
            }
            BrokerBackend::Memory => {
                warn!("Using the in-process broker: jobs are not delivered to any worker");
                let broker = Arc::new(MemoryBroker::new());
                (None, broker.clone(), broker)
            }
        };

    let coordinator = ExperimentCoordinator::new(store, dispatcher, live);
    let state = AppState::new(
        coordinator,
        UploadPolicy::from(&settings.upload),
        settings.pacing.clone(),
        settings.server.static_dir.clone(),
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.bind).await?;
    info!("Server listening on http://{}", settings.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(connection) = connection {
        if let Err(e) = connection.close().await {
            warn!("Broker connection did not close cleanly: {e}");
        }
    }
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
