// main.rs
use device_bridge::{
    build_bridge, config::Settings, metrics::setup_metrics, models::AppState, router,
    utils::spawn_session_sweeper,
};
use std::{sync::Arc, time::Duration};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::new()
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    if settings.metrics.enabled {
        setup_metrics(settings.metrics.port)?;
        tracing::info!("Metrics exporter listening on port {}", settings.metrics.port);
    }

    let bridge = build_bridge(&settings.bridge)?;
    let state = Arc::new(AppState::new(
        Arc::new(bridge),
        settings.server.max_connections as usize,
    ));
    spawn_session_sweeper(
        Arc::clone(&state),
        Duration::from_secs(settings.server.session_ttl_secs),
    );

    let listener = tokio::net::TcpListener::bind(&settings.server.address)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind address: {}", e))?;

    tracing::info!(
        backend = ?settings.bridge.backend,
        init_policy = ?settings.bridge.init_policy,
        "Server started on {}",
        settings.server.address
    );

    axum::serve(listener, router(state))
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
