//! Wire framing for the peer-to-peer channel: JSON text control frames and
//! tag-prefixed binary data chunks.

use serde::{Deserialize, Serialize};

/// Type tag of a data-chunk binary frame.
pub const CHUNK_FRAME_TAG: u8 = 0x01;
/// Tag byte plus three little-endian u32 fields.
pub const CHUNK_HEADER_LEN: usize = 13;

/// Text control frames exchanged alongside the binary chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ControlMessage {
    FileMetadata {
        name: String,
        size: u64,
        mime_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_modified: Option<u64>,
    },
    FileComplete {
        file_name: String,
        total_chunks: u32,
        /// Lowercase hex SHA-256 of the whole file; optional on the wire for
        /// peers that cannot hash.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checksum: Option<String>,
    },
    ChunkAck {
        chunk_index: u32,
    },
}

/// A decoded data chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFrame {
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame truncated")]
    Truncated,
    #[error("unknown frame tag {0:#04x}")]
    UnknownTag(u8),
    #[error("length field {declared} does not match payload {actual}")]
    LengthMismatch { declared: usize, actual: usize },
}

/// Encode one data chunk: tag, chunk_index, total_chunks, data_length (all
/// little-endian u32 after the tag byte), then the payload.
pub fn encode_chunk(chunk_index: u32, total_chunks: u32, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(CHUNK_HEADER_LEN + data.len());
    out.push(CHUNK_FRAME_TAG);
    out.extend_from_slice(&chunk_index.to_le_bytes());
    out.extend_from_slice(&total_chunks.to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    out
}

/// Decode a tagged chunk frame. `UnknownTag` signals a legacy headerless
/// payload and is the caller's cue to fall back to arrival-order handling.
pub fn decode_chunk(frame: &[u8]) -> Result<ChunkFrame, FrameError> {
    if frame.is_empty() {
        return Err(FrameError::Truncated);
    }
    if frame[0] != CHUNK_FRAME_TAG {
        return Err(FrameError::UnknownTag(frame[0]));
    }
    if frame.len() < CHUNK_HEADER_LEN {
        return Err(FrameError::Truncated);
    }

    let chunk_index = read_u32_le(frame, 1);
    let total_chunks = read_u32_le(frame, 5);
    let declared = read_u32_le(frame, 9) as usize;
    let data = &frame[CHUNK_HEADER_LEN..];
    if data.len() != declared {
        return Err(FrameError::LengthMismatch {
            declared,
            actual: data.len(),
        });
    }

    Ok(ChunkFrame {
        chunk_index,
        total_chunks,
        data: data.to_vec(),
    })
}

fn read_u32_le(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_chunk() {
        let data: Vec<u8> = (0..200).map(|i| i as u8).collect();
        let frame = encode_chunk(3, 7, &data);
        assert_eq!(frame.len(), CHUNK_HEADER_LEN + data.len());
        assert_eq!(frame[0], CHUNK_FRAME_TAG);

        let decoded = decode_chunk(&frame).unwrap();
        assert_eq!(decoded.chunk_index, 3);
        assert_eq!(decoded.total_chunks, 7);
        assert_eq!(decoded.data, data);
    }

    #[test]
    fn truncated_header_rejected() {
        let frame = encode_chunk(0, 1, b"payload");
        assert!(matches!(decode_chunk(&frame[..4]), Err(FrameError::Truncated)));
        assert!(matches!(decode_chunk(&[]), Err(FrameError::Truncated)));
    }

    #[test]
    fn unknown_tag_signals_legacy() {
        let raw = [0x7fu8, 1, 2, 3];
        assert!(matches!(
            decode_chunk(&raw),
            Err(FrameError::UnknownTag(0x7f))
        ));
    }

    #[test]
    fn length_mismatch_rejected() {
        let mut frame = encode_chunk(0, 1, b"abcdef");
        frame.truncate(frame.len() - 2);
        assert!(matches!(
            decode_chunk(&frame),
            Err(FrameError::LengthMismatch { declared: 6, actual: 4 })
        ));
    }

    #[test]
    fn control_frame_tags() {
        let json = serde_json::to_value(ControlMessage::FileMetadata {
            name: "report.pdf".to_string(),
            size: 100_000,
            mime_type: "application/pdf".to_string(),
            last_modified: None,
        })
        .unwrap();
        assert_eq!(json["type"], "file-metadata");
        assert!(json.get("last_modified").is_none());

        let json = serde_json::to_value(ControlMessage::ChunkAck { chunk_index: 5 }).unwrap();
        assert_eq!(json["type"], "chunk-ack");
    }

    #[test]
    fn file_complete_checksum_optional() {
        let msg: ControlMessage =
            serde_json::from_str(r#"{"type":"file-complete","file_name":"a.bin","total_chunks":4}"#)
                .unwrap();
        assert_eq!(
            msg,
            ControlMessage::FileComplete {
                file_name: "a.bin".to_string(),
                total_chunks: 4,
                checksum: None
            }
        );
    }
}
