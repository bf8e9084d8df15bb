use beamdrop_backend::{config::Config, error::Result, routes, state::AppState};
use std::net::SocketAddr;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beamdrop_backend=info,tower_http=info".into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("Starting Beamdrop broker...");

    // Load configuration
    let config = Config::from_env()
        .map_err(|e| beamdrop_backend::error::AppError::Config(e.to_string()))?;

    info!("Configuration loaded");

    let port = config.server.port;
    let state = AppState::new(config);

    // Background expiry sweep for stale rooms
    state.rooms.spawn_sweeper(state.config.sweep_interval());

    let app = routes::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Broker listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| beamdrop_backend::error::AppError::Internal(anyhow::anyhow!("Failed to bind: {}", e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| beamdrop_backend::error::AppError::Internal(anyhow::anyhow!("Server error: {}", e)))?;

    Ok(())
}
