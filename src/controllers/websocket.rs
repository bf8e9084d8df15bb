use crate::error::AppError;
use crate::models::room::{PeerRole, SessionEvent};
use crate::models::signaling::{ClientMessage, ServerMessage};
use crate::services::room::RoomRegistry;
use crate::state::AppState;
use axum::extract::{
    ws::{Message, WebSocket, WebSocketUpgrade},
    State,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Frame types the broker understands. Anything else is logged and ignored.
const KNOWN_TYPES: &[&str] = &["join", "offer", "answer", "ice-candidate", "ping"];

/// Protocol phase of one signaling session. Handshake frames are only valid
/// once the session has entered a room.
#[derive(Debug, Clone)]
enum SessionPhase {
    Connecting,
    Joined { room: String, role: PeerRole },
}

/// Handle WebSocket upgrade for a signaling session
pub async fn handle_websocket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> axum::response::Response {
    ws.on_upgrade(move |socket| handle_session(socket, state))
}

async fn handle_session(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4();
    state.connection_opened();
    info!("Signaling session {} connected", session_id);

    let (outbound_tx, outbound_rx) = unbounded_channel::<SessionEvent>();
    let _ = outbound_tx.send(SessionEvent::Frame(ServerMessage::Connected {
        message: "signaling ready".to_string(),
    }));

    let (sink, stream) = socket.split();

    let heartbeat_interval = Duration::from_secs(state.config.websocket.heartbeat_interval_seconds);
    let connection_timeout = Duration::from_secs(state.config.websocket.connection_timeout_seconds);
    let max_message_size = state.config.websocket.max_message_size_bytes;

    // Track last pong time for heartbeat
    let last_pong = Arc::new(Mutex::new(Instant::now()));

    // Channel for pushing pings from the heartbeat task into the send task
    let (ping_tx, ping_rx) = unbounded_channel::<()>();

    // Room membership, shared so cleanup still works when another task ends first
    let membership: Arc<Mutex<Option<(String, PeerRole)>>> = Arc::new(Mutex::new(None));

    let heartbeat_last_pong = last_pong.clone();
    let mut heartbeat_task = tokio::spawn(async move {
        let mut ticker = interval(heartbeat_interval);
        ticker.tick().await; // first tick fires immediately
        loop {
            ticker.tick().await;
            // Two unanswered intervals means the transport is half-open.
            if heartbeat_last_pong.lock().await.elapsed() > heartbeat_interval * 2 {
                warn!("Heartbeat timeout for session {}", session_id);
                break;
            }
            if ping_tx.send(()).is_err() {
                break;
            }
        }
    });

    let mut send_task = tokio::spawn(send_loop(sink, outbound_rx, ping_rx));

    let recv_registry = state.rooms.clone();
    let recv_outbound = outbound_tx.clone();
    let recv_membership = membership.clone();
    let recv_last_pong = last_pong.clone();
    let mut recv_task = tokio::spawn(async move {
        recv_loop(
            stream,
            recv_registry,
            session_id,
            recv_outbound,
            recv_membership,
            recv_last_pong,
            max_message_size,
            connection_timeout,
        )
        .await;
    });

    // Wait for any task to end, then stop the others
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            heartbeat_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
            heartbeat_task.abort();
        }
        _ = &mut heartbeat_task => {
            send_task.abort();
            recv_task.abort();
        }
    }

    if let Some((room, _role)) = membership.lock().await.take() {
        state.rooms.detach(&room, session_id).await;
    }
    state.connection_closed();
    info!("Signaling session {} closed", session_id);
}

/// Drain the session's outbound queue into the socket and push heartbeat
/// pings when the heartbeat task asks for one.
async fn send_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: UnboundedReceiver<SessionEvent>,
    mut pings: UnboundedReceiver<()>,
) {
    loop {
        tokio::select! {
            event = outbound.recv() => {
                match event {
                    Some(SessionEvent::Frame(msg)) => {
                        let text = match serde_json::to_string(&msg) {
                            Ok(text) => text,
                            Err(e) => {
                                warn!("Failed to encode outbound frame: {}", e);
                                continue;
                            }
                        };
                        if sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Some(SessionEvent::Close) => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    None => break,
                }
            }
            ping = pings.recv() => {
                // None means the heartbeat task is gone and teardown is underway.
                if ping.is_none() || sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn recv_loop(
    mut stream: SplitStream<WebSocket>,
    registry: RoomRegistry,
    session_id: Uuid,
    outbound: UnboundedSender<SessionEvent>,
    membership: Arc<Mutex<Option<(String, PeerRole)>>>,
    last_pong: Arc<Mutex<Instant>>,
    max_message_size: usize,
    connection_timeout: Duration,
) {
    let mut phase = SessionPhase::Connecting;
    loop {
        match timeout(connection_timeout, stream.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                if text.len() > max_message_size {
                    warn!(
                        "Frame of {} bytes exceeds limit {} on session {}",
                        text.len(),
                        max_message_size,
                        session_id
                    );
                    send_error(&outbound, "Message too large");
                    break;
                }
                handle_frame(
                    &registry,
                    session_id,
                    &outbound,
                    &membership,
                    &mut phase,
                    &text,
                )
                .await;
            }
            Ok(Some(Ok(Message::Pong(_)))) => {
                *last_pong.lock().await = Instant::now();
            }
            Ok(Some(Ok(Message::Ping(_)))) => {
                // axum replies with a pong automatically
            }
            Ok(Some(Ok(Message::Close(_)))) => break,
            Ok(Some(Ok(_))) => {
                // Binary traffic belongs on the peer-to-peer channel, never here.
                debug!("Ignoring binary frame on signaling session {}", session_id);
            }
            Ok(Some(Err(_))) => break,
            Ok(None) => break,
            Err(_) => {
                warn!("Receive timeout on session {}", session_id);
                break;
            }
        }
    }
}

async fn handle_frame(
    registry: &RoomRegistry,
    session_id: Uuid,
    outbound: &UnboundedSender<SessionEvent>,
    membership: &Arc<Mutex<Option<(String, PeerRole)>>>,
    phase: &mut SessionPhase,
    text: &str,
) {
    let msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            // Unknown `type` values are ignored; everything else is malformed.
            if let Ok(value) = serde_json::from_str::<Value>(text) {
                if let Some(kind) = value.get("type").and_then(Value::as_str) {
                    if !KNOWN_TYPES.contains(&kind) {
                        debug!("Ignoring unknown frame type {:?}", kind);
                        return;
                    }
                }
            }
            send_error(outbound, &AppError::MalformedFrame(e.to_string()).to_string());
            return;
        }
    };

    match msg {
        ClientMessage::Ping => {
            let _ = outbound.send(SessionEvent::Frame(ServerMessage::Pong));
        }
        ClientMessage::Join { create_new, room_id } => {
            if matches!(phase, SessionPhase::Joined { .. }) {
                send_error(outbound, &AppError::AlreadyJoined.to_string());
                return;
            }
            let result = if create_new {
                registry
                    .create_room(session_id, outbound.clone())
                    .await
                    .map(|code| (code, PeerRole::Sender))
            } else if let Some(room_id) = room_id {
                registry
                    .join_room(&room_id, session_id, outbound.clone())
                    .await
                    .map(|code| (code, PeerRole::Receiver))
            } else {
                Err(AppError::MalformedFrame(
                    "join requires create_new or room_id".to_string(),
                ))
            };
            match result {
                Ok((code, role)) => {
                    *phase = SessionPhase::Joined {
                        room: code.clone(),
                        role,
                    };
                    *membership.lock().await = Some((code, role));
                }
                // Invalid joins keep the session open so the caller can retry.
                Err(e) => send_error(outbound, &e.to_string()),
            }
        }
        ClientMessage::Offer { offer } => match &*phase {
            SessionPhase::Joined { room, .. } => {
                if let Err(e) = registry.forward_offer(room, offer).await {
                    send_error(outbound, &e.to_string());
                }
            }
            SessionPhase::Connecting => send_error(outbound, &AppError::NotJoined.to_string()),
        },
        ClientMessage::Answer { answer } => match &*phase {
            SessionPhase::Joined { room, .. } => {
                if let Err(e) = registry.forward_answer(room, answer).await {
                    send_error(outbound, &e.to_string());
                }
            }
            SessionPhase::Connecting => send_error(outbound, &AppError::NotJoined.to_string()),
        },
        ClientMessage::IceCandidate { candidate } => match &*phase {
            SessionPhase::Joined { room, role } => {
                if let Err(e) = registry.forward_candidate(room, *role, candidate).await {
                    send_error(outbound, &e.to_string());
                }
            }
            SessionPhase::Connecting => send_error(outbound, &AppError::NotJoined.to_string()),
        },
    }
}

fn send_error(outbound: &UnboundedSender<SessionEvent>, message: &str) {
    let _ = outbound.send(SessionEvent::Frame(ServerMessage::Error {
        message: message.to_string(),
    }));
}
