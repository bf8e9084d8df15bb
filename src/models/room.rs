use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::models::signaling::ServerMessage;

/// Which side of the transfer a peer is on. The room creator is always the
/// sender; the joiner is always the receiver. Roles never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerRole {
    Sender,
    Receiver,
}

impl PeerRole {
    pub fn counterpart(self) -> Self {
        match self {
            PeerRole::Sender => PeerRole::Receiver,
            PeerRole::Receiver => PeerRole::Sender,
        }
    }
}

/// Commands for a session's socket-facing send task.
#[derive(Debug)]
pub enum SessionEvent {
    Frame(ServerMessage),
    Close,
}

/// One attached endpoint of a room. Holds the non-blocking handle to the
/// session's outbound queue; the WebSocket itself lives in the session tasks.
#[derive(Debug, Clone)]
pub struct SignalingSession {
    pub id: Uuid,
    pub role: PeerRole,
    outbound: UnboundedSender<SessionEvent>,
}

impl SignalingSession {
    pub fn new(id: Uuid, role: PeerRole, outbound: UnboundedSender<SessionEvent>) -> Self {
        Self { id, role, outbound }
    }

    /// Enqueue a frame for the peer. Returns false when the transport side
    /// is already gone.
    pub fn send(&self, msg: ServerMessage) -> bool {
        self.outbound.send(SessionEvent::Frame(msg)).is_ok()
    }

    /// Ask the session's send task to close the socket.
    pub fn close(&self) {
        let _ = self.outbound.send(SessionEvent::Close);
    }
}

/// An ephemeral two-peer rendezvous. `pending_offer`/`pending_answer` hold at
/// most one handshake frame each for a counterpart that has not attached yet.
#[derive(Debug)]
pub struct Room {
    pub code: String,
    pub peers: Vec<SignalingSession>,
    pub created_at: Instant,
    pub pending_offer: Option<Value>,
    pub pending_answer: Option<Value>,
}

impl Room {
    pub fn new(code: String, creator: SignalingSession) -> Self {
        Self {
            code,
            peers: vec![creator],
            created_at: Instant::now(),
            pending_offer: None,
            pending_answer: None,
        }
    }

    pub fn peer(&self, role: PeerRole) -> Option<&SignalingSession> {
        self.peers.iter().find(|p| p.role == role)
    }

    pub fn is_expired(&self, expiry: Duration) -> bool {
        self.created_at.elapsed() > expiry
    }
}
