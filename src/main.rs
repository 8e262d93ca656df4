use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use watch_server::{
    config::Config,
    hub::Hub,
    registry::RoomRegistry,
    room::RoomStore,
    utils::mirror::Mirror,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .init();

    let registry = RoomRegistry::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open room registry at {}", config.database_url))?;
    registry.migrate().await.context("failed to create room registry schema")?;

    let mirror = Mirror::spawn(registry.clone());   // background registry writer
    let hub = Hub::new(RoomStore::new(config.room_channel_capacity), mirror);
    let app = watch_server::app(registry, hub);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(listen_addr = %config.listen_addr, "watch server listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited unexpectedly")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
