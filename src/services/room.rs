use crate::error::{AppError, Result};
use crate::models::room::{PeerRole, Room, SessionEvent, SignalingSession};
use crate::models::signaling::ServerMessage;
use crate::services::code_generator::CodeGenerator;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub room_expiry: Duration,
    pub max_peers: usize,
    pub code_retry_max: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            room_expiry: Duration::from_secs(600),
            max_peers: 2,
            code_retry_max: 16,
        }
    }
}

/// Read-only view of one room, for the HTTP surface and tests.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub peer_count: usize,
    pub has_pending_offer: bool,
    pub has_pending_answer: bool,
    pub age: Duration,
}

// In-memory room table. All mutation happens under the single table lock;
// sends taken under the lock are unbounded-channel enqueues and never block.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, Room>>>,
    config: RegistryConfig,
}

impl RoomRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Create a fresh room with this session attached as the sending peer.
    /// The creator receives its `joined` frame before this returns.
    pub async fn create_room(
        &self,
        session_id: Uuid,
        outbound: UnboundedSender<SessionEvent>,
    ) -> Result<String> {
        let mut rooms = self.rooms.write().await;
        for _ in 0..self.config.code_retry_max {
            let code = CodeGenerator::generate();
            if rooms.contains_key(&code) {
                warn!("Room code collision: {}, retrying", code);
                continue;
            }
            let creator = SignalingSession::new(session_id, PeerRole::Sender, outbound);
            creator.send(ServerMessage::Joined {
                room_id: code.clone(),
                role: PeerRole::Sender,
                peer_count: 1,
            });
            rooms.insert(code.clone(), Room::new(code.clone(), creator));
            info!("Created room {}", code);
            return Ok(code);
        }
        Err(AppError::CodeGenerationFailed)
    }

    /// Attach a session to an existing room as the receiving peer. Both peers
    /// get a `joined` frame; a buffered offer is drained to the joiner right
    /// after its `joined`, preserving the handshake ordering contract.
    pub async fn join_room(
        &self,
        code: &str,
        session_id: Uuid,
        outbound: UnboundedSender<SessionEvent>,
    ) -> Result<String> {
        let code = CodeGenerator::normalize(code);
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(&code).ok_or(AppError::RoomNotFound)?;
        if room.peers.len() >= self.config.max_peers {
            return Err(AppError::RoomFull);
        }

        room.peers
            .push(SignalingSession::new(session_id, PeerRole::Receiver, outbound));
        let peer_count = room.peers.len();
        for peer in &room.peers {
            peer.send(ServerMessage::Joined {
                room_id: code.clone(),
                role: peer.role,
                peer_count,
            });
        }

        if let Some(offer) = room.pending_offer.take() {
            debug!("Draining pending offer in room {}", code);
            if let Some(receiver) = room.peer(PeerRole::Receiver) {
                receiver.send(ServerMessage::Offer { offer });
            }
        }

        info!("Peer joined room {} ({} peers)", code, peer_count);
        Ok(code)
    }

    /// Offers flow to the receiving peer; when it has not attached yet the
    /// frame is buffered for delivery right after its `joined`.
    pub async fn forward_offer(&self, code: &str, offer: Value) -> Result<()> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(code).ok_or(AppError::RoomNotFound)?;
        match room.peer(PeerRole::Receiver) {
            Some(receiver) => {
                receiver.send(ServerMessage::Offer { offer });
            }
            None => {
                debug!("Buffering offer in room {}", code);
                room.pending_offer = Some(offer);
            }
        }
        Ok(())
    }

    /// Answers flow to the sending peer, with the same buffering rule.
    pub async fn forward_answer(&self, code: &str, answer: Value) -> Result<()> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(code).ok_or(AppError::RoomNotFound)?;
        match room.peer(PeerRole::Sender) {
            Some(sender) => {
                sender.send(ServerMessage::Answer { answer });
            }
            None => {
                debug!("Buffering answer in room {}", code);
                room.pending_answer = Some(answer);
            }
        }
        Ok(())
    }

    /// ICE candidates go to the other peer and are never buffered; an ICE
    /// restart regenerates them.
    pub async fn forward_candidate(&self, code: &str, from: PeerRole, candidate: Value) -> Result<()> {
        let rooms = self.rooms.read().await;
        let room = rooms.get(code).ok_or(AppError::RoomNotFound)?;
        match room.peer(from.counterpart()) {
            Some(peer) => {
                peer.send(ServerMessage::IceCandidate { candidate });
            }
            None => {
                debug!("Dropping ICE candidate in room {}: counterpart not attached", code);
            }
        }
        Ok(())
    }

    /// Remove a session from its room, notify the survivor, and drop the room
    /// once it is empty.
    pub async fn detach(&self, code: &str, session_id: Uuid) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else {
            return;
        };
        let before = room.peers.len();
        room.peers.retain(|p| p.id != session_id);
        if room.peers.len() == before {
            return;
        }
        for peer in &room.peers {
            peer.send(ServerMessage::PeerDisconnected);
        }
        if room.peers.is_empty() {
            rooms.remove(code);
            info!("Removed empty room {}", code);
        } else {
            info!("Peer left room {}", code);
        }
    }

    /// Tear down every room past its expiry: notify peers, close their
    /// sessions, remove the room. Returns how many rooms died.
    pub async fn sweep_expired(&self) -> usize {
        let mut rooms = self.rooms.write().await;
        let expired: Vec<String> = rooms
            .iter()
            .filter(|(_, room)| room.is_expired(self.config.room_expiry))
            .map(|(code, _)| code.clone())
            .collect();
        for code in &expired {
            if let Some(room) = rooms.remove(code) {
                for peer in &room.peers {
                    peer.send(ServerMessage::RoomExpired);
                    peer.close();
                }
                info!("Room {} expired ({} peers notified)", code, room.peers.len());
            }
        }
        expired.len()
    }

    /// Drive the expiry sweep until the process exits.
    pub fn spawn_sweeper(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let swept = registry.sweep_expired().await;
                if swept > 0 {
                    debug!("Expiry sweep removed {} room(s)", swept);
                }
            }
        })
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn peer_count(&self) -> usize {
        self.rooms.read().await.values().map(|r| r.peers.len()).sum()
    }

    pub async fn snapshot(&self, code: &str) -> Option<RoomSnapshot> {
        let rooms = self.rooms.read().await;
        rooms.get(code).map(|room| RoomSnapshot {
            peer_count: room.peers.len(),
            has_pending_offer: room.pending_offer.is_some(),
            has_pending_answer: room.pending_answer.is_some(),
            age: room.created_at.elapsed(),
        })
    }
}
