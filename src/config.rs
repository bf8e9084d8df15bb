use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_server")]
    pub server: ServerConfig,
    #[serde(default = "default_room")]
    pub room: RoomConfig,
    #[serde(default = "default_websocket")]
    pub websocket: WebSocketConfig,
    #[serde(default = "default_transfer")]
    pub transfer: TransferConfig,
    #[serde(default = "default_cors")]
    pub cors: CorsConfig,
}

fn default_server() -> ServerConfig {
    ServerConfig {
        host: "0.0.0.0".to_string(),
        port: 3001,
        ws_path: "/ws".to_string(),
        environment: "development".to_string(),
        https: false,
    }
}

fn default_room() -> RoomConfig {
    RoomConfig {
        expiry_seconds: 600,
        sweep_interval_seconds: 30,
        max_peers: 2,
        code_retry_max: 16,
    }
}

fn default_websocket() -> WebSocketConfig {
    WebSocketConfig {
        max_message_size_bytes: default_ws_max_message_size(),
        heartbeat_interval_seconds: default_ws_heartbeat_interval(),
        connection_timeout_seconds: default_ws_connection_timeout(),
    }
}

fn default_ws_max_message_size() -> usize {
    64 * 1024 // 64KB
}

fn default_ws_heartbeat_interval() -> u64 {
    30 // 30 seconds
}

fn default_ws_connection_timeout() -> u64 {
    300 // 5 minutes
}

fn default_transfer() -> TransferConfig {
    TransferConfig {
        chunk_size_bytes: default_chunk_size(),
        buffer_threshold_bytes: default_buffer_threshold(),
        backoff_ms: default_backoff_ms(),
        interfile_pause_ms: default_interfile_pause_ms(),
    }
}

fn default_chunk_size() -> usize {
    64 * 1024 // 64KB
}

fn default_buffer_threshold() -> u64 {
    1024 * 1024 // 1MB
}

fn default_backoff_ms() -> u64 {
    100
}

fn default_interfile_pause_ms() -> u64 {
    100
}

fn default_cors() -> CorsConfig {
    CorsConfig {
        allowed_origin: default_cors_origin(),
    }
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub ws_path: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub https: bool,
}

fn default_environment() -> String {
    "development".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    pub expiry_seconds: u64,
    pub sweep_interval_seconds: u64,
    /// The broker is designed for exactly two peers per room; other values
    /// are undefined behavior for the signaling protocol.
    pub max_peers: u32,
    pub code_retry_max: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    #[serde(default = "default_ws_max_message_size")]
    pub max_message_size_bytes: usize,
    #[serde(default = "default_ws_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    #[serde(default = "default_ws_connection_timeout")]
    pub connection_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: usize,
    #[serde(default = "default_buffer_threshold")]
    pub buffer_threshold_bytes: u64,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_interfile_pause_ms")]
    pub interfile_pause_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_cors_origin")]
    pub allowed_origin: String,
}

impl Config {
    pub fn from_env() -> Result<Self, figment::Error> {
        dotenvy::dotenv().ok();

        use figment::{providers::Env, Figment};

        let mut config: Config = Figment::new()
            .merge(Env::raw().split("__"))
            .extract()?;

        // Set defaults if not provided
        if config.server.host.is_empty() {
            config.server = default_server();
        }
        if config.room.expiry_seconds == 0 {
            config.room = default_room();
        }
        if config.cors.allowed_origin.is_empty() {
            config.cors = default_cors();
        }

        Ok(config)
    }

    pub fn room_expiry(&self) -> Duration {
        Duration::from_secs(self.room.expiry_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.room.sweep_interval_seconds)
    }

    /// Engine-side view of the transfer tunables.
    pub fn transfer_config(&self) -> crate::transfer::TransferConfig {
        crate::transfer::TransferConfig {
            chunk_size: self.transfer.chunk_size_bytes,
            buffer_threshold: self.transfer.buffer_threshold_bytes,
            backoff: Duration::from_millis(self.transfer.backoff_ms),
            interfile_pause: Duration::from_millis(self.transfer.interfile_pause_ms),
        }
    }
}
