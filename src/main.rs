//! pgchat-relay server entry point.
//!
//! Wires the store, the notification channel, the connection registry,
//! and the process-wide notification listener, then serves REST and
//! WebSocket endpoints until interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use pgchat_relay::app_state::AppState;
use pgchat_relay::channel::{
    InMemoryNotificationChannel, NOTIFICATION_CHANNEL, NotificationChannel, PgNotificationChannel,
};
use pgchat_relay::config::{LogFormat, RelayConfig};
use pgchat_relay::persistence::{ChatStore, InMemoryChatStore, PostgresChatStore};
use pgchat_relay::server::build_app;
use pgchat_relay::service::NotificationListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RelayConfig::from_env().map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    init_tracing(config.log_format);
    tracing::info!(addr = %config.listen_addr, "starting pgchat-relay");

    let (store, channel) = build_collaborators(&config).await?;

    let state = AppState::new(store, Arc::clone(&channel), &config);
    let listener = NotificationListener::start(
        channel,
        NOTIFICATION_CHANNEL,
        Arc::clone(&state.registry),
        config.retry_policy(),
    )
    .await
    .context("subscribing to notification channel")?;

    let app = build_app(state, &config);
    let tcp = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    listener.stop().await;
    tracing::info!("shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// Builds the store and channel. Store writes and notification publishes
/// use separate pools so a publish never shares a transaction with a write.
async fn build_collaborators(
    config: &RelayConfig,
) -> anyhow::Result<(Arc<dyn ChatStore>, Arc<dyn NotificationChannel>)> {
    if !config.persistence_enabled {
        tracing::warn!("persistence disabled: in-memory store, fan-out limited to this process");
        let store: Arc<dyn ChatStore> = Arc::new(InMemoryChatStore::new());
        let channel: Arc<dyn NotificationChannel> =
            Arc::new(InMemoryNotificationChannel::new(config.local_channel_capacity));
        return Ok((store, channel));
    }

    let acquire_timeout = Duration::from_secs(config.database_connect_timeout_secs);
    let store_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(acquire_timeout)
        .connect(&config.database_url)
        .await
        .context("connecting store pool")?;
    let notify_pool = PgPoolOptions::new()
        .max_connections(config.notify_max_connections.max(1))
        .acquire_timeout(acquire_timeout)
        .connect(&config.database_url)
        .await
        .context("connecting notify pool")?;
    tracing::info!("connected to postgres");

    let store: Arc<dyn ChatStore> = Arc::new(PostgresChatStore::new(store_pool));
    let channel: Arc<dyn NotificationChannel> = Arc::new(PgNotificationChannel::new(notify_pool));
    Ok((store, channel))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
