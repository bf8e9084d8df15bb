use crate::controllers::{health, websocket};
use crate::middleware::create_cors_layer;
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn create_router(state: AppState) -> Router {
    let cors = create_cors_layer(&state.config.cors);
    let ws_path = state.config.server.ws_path.clone();

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/info", get(health::server_info))
        .route(&ws_path, get(websocket::handle_websocket))
        .layer(cors)
        .with_state(state)
}
