//! End-to-end broker scenarios, driven against the room registry the same
//! way the WebSocket sessions drive it.

use beamdrop_backend::error::AppError;
use beamdrop_backend::models::room::SessionEvent;
use beamdrop_backend::models::signaling::ServerMessage;
use beamdrop_backend::services::code_generator::{CodeGenerator, CODE_ALPHABET, CODE_LENGTH};
use beamdrop_backend::services::room::{RegistryConfig, RoomRegistry};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

struct TestPeer {
    id: Uuid,
    tx: UnboundedSender<SessionEvent>,
    rx: UnboundedReceiver<SessionEvent>,
}

fn peer() -> TestPeer {
    let (tx, rx) = unbounded_channel();
    TestPeer {
        id: Uuid::new_v4(),
        tx,
        rx,
    }
}

impl TestPeer {
    fn next_frame(&mut self) -> ServerMessage {
        match self.rx.try_recv().expect("expected a queued event") {
            SessionEvent::Frame(msg) => msg,
            SessionEvent::Close => panic!("expected a frame, got close"),
        }
    }

    fn drain(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

fn registry() -> RoomRegistry {
    RoomRegistry::new(RegistryConfig::default())
}

fn registry_with_expiry(expiry: Duration) -> RoomRegistry {
    RoomRegistry::new(RegistryConfig {
        room_expiry: expiry,
        ..RegistryConfig::default()
    })
}

#[tokio::test]
async fn creator_is_sender_with_wellformed_code() {
    let registry = registry();
    let mut creator = peer();

    let code = registry
        .create_room(creator.id, creator.tx.clone())
        .await
        .unwrap();

    assert_eq!(code.len(), CODE_LENGTH);
    for c in code.bytes() {
        assert!(CODE_ALPHABET.contains(&c));
    }

    match creator.next_frame() {
        ServerMessage::Joined {
            room_id,
            role,
            peer_count,
        } => {
            assert_eq!(room_id, code);
            assert_eq!(serde_json::to_value(role).unwrap(), "sender");
            assert_eq!(peer_count, 1);
        }
        other => panic!("expected joined, got {:?}", other),
    }
}

#[tokio::test]
async fn join_notifies_both_peers() {
    let registry = registry();
    let mut creator = peer();
    let mut joiner = peer();

    let code = registry
        .create_room(creator.id, creator.tx.clone())
        .await
        .unwrap();
    creator.next_frame(); // own joined

    registry
        .join_room(&code, joiner.id, joiner.tx.clone())
        .await
        .unwrap();

    match creator.next_frame() {
        ServerMessage::Joined {
            role, peer_count, ..
        } => {
            assert_eq!(serde_json::to_value(role).unwrap(), "sender");
            assert_eq!(peer_count, 2);
        }
        other => panic!("expected joined, got {:?}", other),
    }
    match joiner.next_frame() {
        ServerMessage::Joined {
            role, peer_count, ..
        } => {
            assert_eq!(serde_json::to_value(role).unwrap(), "receiver");
            assert_eq!(peer_count, 2);
        }
        other => panic!("expected joined, got {:?}", other),
    }
}

#[tokio::test]
async fn late_joiner_sees_joined_then_buffered_offer_exactly_once() {
    let registry = registry();
    let mut creator = peer();

    let code = registry
        .create_room(creator.id, creator.tx.clone())
        .await
        .unwrap();

    // Sender produces its offer before anyone joined.
    let offer = json!({"type": "offer", "sdp": "v=0"});
    registry.forward_offer(&code, offer.clone()).await.unwrap();
    assert!(registry.snapshot(&code).await.unwrap().has_pending_offer);

    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut joiner = peer();
    registry
        .join_room(&code, joiner.id, joiner.tx.clone())
        .await
        .unwrap();

    // Ordering contract: joined strictly before the drained offer.
    assert!(matches!(joiner.next_frame(), ServerMessage::Joined { .. }));
    match joiner.next_frame() {
        ServerMessage::Offer { offer: delivered } => assert_eq!(delivered, offer),
        other => panic!("expected offer, got {:?}", other),
    }
    assert!(joiner.drain().is_empty(), "offer must arrive exactly once");
    assert!(!registry.snapshot(&code).await.unwrap().has_pending_offer);
}

#[tokio::test]
async fn third_peer_is_rejected_and_stays_connected() {
    let registry = registry();
    let creator = peer();
    let joiner = peer();
    let mut third = peer();

    let code = registry
        .create_room(creator.id, creator.tx.clone())
        .await
        .unwrap();
    registry
        .join_room(&code, joiner.id, joiner.tx.clone())
        .await
        .unwrap();

    let err = registry
        .join_room(&code, third.id, third.tx.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RoomFull));

    assert_eq!(registry.snapshot(&code).await.unwrap().peer_count, 2);
    // The rejected session is not torn down; the caller may retry.
    assert!(third.drain().is_empty());
}

#[tokio::test]
async fn expired_room_notifies_each_peer_once_and_disconnects() {
    let registry = registry_with_expiry(Duration::from_millis(50));
    let mut creator = peer();
    let mut joiner = peer();

    let code = registry
        .create_room(creator.id, creator.tx.clone())
        .await
        .unwrap();
    registry
        .join_room(&code, joiner.id, joiner.tx.clone())
        .await
        .unwrap();
    creator.drain();
    joiner.drain();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(registry.sweep_expired().await, 1);

    for p in [&mut creator, &mut joiner] {
        let events = p.drain();
        let expired = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Frame(ServerMessage::RoomExpired)))
            .count();
        assert_eq!(expired, 1, "exactly one room-expired per peer");
        assert!(
            matches!(events.last(), Some(SessionEvent::Close)),
            "session closed after the notification"
        );
    }

    assert_eq!(registry.room_count().await, 0);
    assert!(registry.snapshot(&code).await.is_none());
}

#[tokio::test]
async fn sweeper_task_removes_stale_rooms() {
    let registry = registry_with_expiry(Duration::from_millis(50));
    let creator = peer();

    registry
        .create_room(creator.id, creator.tx.clone())
        .await
        .unwrap();
    let handle = registry.spawn_sweeper(Duration::from_millis(20));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(registry.room_count().await, 0);
    handle.abort();
}

#[tokio::test]
async fn concurrent_joins_never_exceed_capacity() {
    let registry = registry();
    let creator = peer();
    let code = registry
        .create_room(creator.id, creator.tx.clone())
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let registry = registry.clone();
        let code = code.clone();
        handles.push(tokio::spawn(async move {
            let contender = peer();
            let joined = registry
                .join_room(&code, contender.id, contender.tx.clone())
                .await
                .is_ok();
            (joined, contender)
        }));
    }

    let mut admitted = 0;
    let mut contenders = Vec::new();
    for handle in handles {
        let (joined, contender) = handle.await.unwrap();
        if joined {
            admitted += 1;
        }
        contenders.push(contender); // keep transports alive
    }

    assert_eq!(admitted, 1);
    assert_eq!(registry.snapshot(&code).await.unwrap().peer_count, 2);
}

#[tokio::test]
async fn detach_notifies_survivor_then_removes_empty_room() {
    let registry = registry();
    let mut creator = peer();
    let joiner = peer();

    let code = registry
        .create_room(creator.id, creator.tx.clone())
        .await
        .unwrap();
    registry
        .join_room(&code, joiner.id, joiner.tx.clone())
        .await
        .unwrap();
    creator.drain();

    registry.detach(&code, joiner.id).await;
    let notified = creator
        .drain()
        .iter()
        .filter(|e| matches!(e, SessionEvent::Frame(ServerMessage::PeerDisconnected)))
        .count();
    assert_eq!(notified, 1);
    assert_eq!(registry.snapshot(&code).await.unwrap().peer_count, 1);

    registry.detach(&code, creator.id).await;
    assert!(registry.snapshot(&code).await.is_none());
    assert_eq!(registry.room_count().await, 0);
}

#[tokio::test]
async fn answer_is_buffered_while_sender_is_gone() {
    let registry = registry();
    let creator = peer();
    let joiner = peer();

    let code = registry
        .create_room(creator.id, creator.tx.clone())
        .await
        .unwrap();
    registry
        .join_room(&code, joiner.id, joiner.tx.clone())
        .await
        .unwrap();

    registry.detach(&code, creator.id).await;
    registry
        .forward_answer(&code, json!({"sdp": "v=0"}))
        .await
        .unwrap();

    let snap = registry.snapshot(&code).await.unwrap();
    assert!(snap.has_pending_answer);
    // Pending buffers never outlive the room.
    registry.detach(&code, joiner.id).await;
    assert!(registry.snapshot(&code).await.is_none());
}

#[tokio::test]
async fn join_accepts_lowercase_codes() {
    let registry = registry();
    let creator = peer();
    let joiner = peer();

    let code = registry
        .create_room(creator.id, creator.tx.clone())
        .await
        .unwrap();
    let joined = registry
        .join_room(&code.to_ascii_lowercase(), joiner.id, joiner.tx.clone())
        .await
        .unwrap();
    assert_eq!(joined, CodeGenerator::normalize(&code));
    assert_eq!(joined, code);
}

#[tokio::test]
async fn unknown_room_is_an_error_without_teardown() {
    let registry = registry();
    let mut joiner = peer();

    let err = registry
        .join_room("QQQQQQ", joiner.id, joiner.tx.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RoomNotFound));
    assert!(joiner.drain().is_empty());
}
