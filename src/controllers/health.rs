use crate::models::api::{HealthResponse, InfoResponse};
use crate::state::AppState;
use axum::{extract::State, Json};
use chrono::Utc;

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        rooms: state.rooms.room_count().await,
        connections: state.connection_count(),
        uptime: state.uptime().as_secs(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

pub async fn server_info(State(state): State<AppState>) -> Json<InfoResponse> {
    let config = &state.config;
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: config.server.environment.clone(),
        https: config.server.https,
        room_expiry: config.room.expiry_seconds * 1000,
        max_room_size: config.room.max_peers,
        network_ip: detect_network_ip(),
        port: config.server.port,
    })
}

/// Best-effort LAN address: route a UDP socket toward a public IP and read
/// back the local address the OS picked. No packets are actually sent.
fn detect_network_ip() -> Option<String> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    Some(socket.local_addr().ok()?.ip().to_string())
}
