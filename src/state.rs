use crate::config::Config;
use crate::services::room::{RegistryConfig, RoomRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct AppState {
    pub rooms: RoomRegistry,
    pub config: Arc<Config>,
    started_at: Instant,
    connections: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let rooms = RoomRegistry::new(RegistryConfig {
            room_expiry: config.room_expiry(),
            max_peers: config.room.max_peers as usize,
            code_retry_max: config.room.code_retry_max,
        });
        Self {
            rooms,
            config: Arc::new(config),
            started_at: Instant::now(),
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn connection_opened(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
