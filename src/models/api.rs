use serde::Serialize;

// Response DTOs for the HTTP surface

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub rooms: usize,
    pub connections: usize,
    /// Seconds since process start.
    pub uptime: u64,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub environment: String,
    pub https: bool,
    /// Milliseconds, matching what the browser client feeds into its countdown.
    pub room_expiry: u64,
    pub max_room_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_ip: Option<String>,
    pub port: u16,
}
