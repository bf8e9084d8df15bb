use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::room::PeerRole;

/// Frames a browser endpoint may send to the broker. SDP and ICE payloads
/// are opaque to the broker and relayed as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Join {
        #[serde(default)]
        create_new: bool,
        #[serde(default)]
        room_id: Option<String>,
    },
    Offer {
        offer: Value,
    },
    Answer {
        answer: Value,
    },
    IceCandidate {
        candidate: Value,
    },
    Ping,
}

/// Frames the broker sends to an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    Connected {
        message: String,
    },
    Joined {
        room_id: String,
        role: PeerRole,
        peer_count: usize,
    },
    Offer {
        offer: Value,
    },
    Answer {
        answer: Value,
    },
    IceCandidate {
        candidate: Value,
    },
    Error {
        message: String,
    },
    PeerDisconnected,
    RoomExpired,
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_tag_and_defaults() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"join","create_new":true}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Join {
                create_new: true,
                room_id: None
            }
        );

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"join","room_id":"ABCXYZ"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Join {
                create_new: false,
                room_id: Some("ABCXYZ".to_string())
            }
        );
    }

    #[test]
    fn test_hyphenated_tags() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"ice-candidate","candidate":{"sdpMid":"0"}}"#).unwrap();
        assert!(matches!(msg, ClientMessage::IceCandidate { .. }));

        let out = serde_json::to_value(ServerMessage::PeerDisconnected).unwrap();
        assert_eq!(out, json!({"type": "peer-disconnected"}));

        let out = serde_json::to_value(ServerMessage::RoomExpired).unwrap();
        assert_eq!(out, json!({"type": "room-expired"}));
    }

    #[test]
    fn test_joined_payload_shape() {
        let out = serde_json::to_value(ServerMessage::Joined {
            room_id: "WORKIN".to_string(),
            role: PeerRole::Sender,
            peer_count: 1,
        })
        .unwrap();
        assert_eq!(
            out,
            json!({"type": "joined", "room_id": "WORKIN", "role": "sender", "peer_count": 1})
        );
    }
}
