use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use common::BusPublisher;
use dlq_server::config::AppConfig;
use dlq_server::dlq::{DlqProcessor, DlqStore, Scanner, SqlDlqStore};
use dlq_server::shutdown::shutdown_signal;
use dlq_server::state::AppState;
use dlq_server::{build_router, consumers, database};
use mq::{BroccoliBus, DisabledBus, MqConfig, init_mq};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let db = database::init_db(&config.database.url)
        .await
        .context("failed to connect to database")?;
    database::ensure_indexes(&db).await?;

    let store: Arc<dyn DlqStore> =
        Arc::new(SqlDlqStore::new(db).with_recovery_window(config.dlq.recovery_window()));

    let broccoli = if config.mq.enabled {
        let queue = init_mq(MqConfig {
            url: config.mq.url.clone(),
            pool_size: config.mq.pool_size,
        })
        .await
        .context("failed to connect to message bus")?;
        info!(url = %config.mq.url, "Connected to message bus");
        Some(BroccoliBus::new(Arc::new(queue)))
    } else {
        warn!("Message bus disabled: nothing is ingested and retries will fail");
        None
    };

    let bus: Arc<dyn BusPublisher> = match &broccoli {
        Some(b) => Arc::new(b.clone()),
        None => Arc::new(DisabledBus),
    };

    let consumer_handles = match &broccoli {
        Some(b) if config.dlq.ingest_enabled => {
            consumers::spawn_dlq_consumers(b, &DlqProcessor::new(store.clone()))
        }
        _ => Vec::new(),
    };

    let scanner_token = CancellationToken::new();
    let scanner = config.dlq.scanner_enabled.then(|| {
        Scanner::new(store.clone(), bus.clone(), config.dlq.scan_interval())
            .start(scanner_token.clone())
    });

    let app = build_router(AppState { store, bus }, &config.server);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server.host / server.port")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(
        "DLQ server running at http://{}{}",
        addr, config.server.base_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scanner_token.cancel();
    if let Some(handle) = scanner {
        handle.wait().await;
    }
    for handle in consumer_handles {
        handle.abort();
    }

    info!("DLQ server stopped");
    Ok(())
}
