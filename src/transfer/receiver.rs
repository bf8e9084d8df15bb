use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::transfer::channel::DataChannel;
use crate::transfer::frame::{self, ControlMessage, FrameError};
use crate::transfer::{TransferConfig, TransferProgress, TransferWarning};

/// Reassembly state for the file currently in flight. Files are strictly
/// sequential end-to-end, so there is at most one.
struct IncomingFile {
    name: String,
    declared_size: u64,
    mime_type: String,
    /// ceil(declared_size / chunk_size); the completion frame confirms it.
    expected_chunks: u32,
    chunks: HashMap<u32, Vec<u8>>,
    bytes_received: u64,
    started_at: Instant,
    /// Arrival-order index counter for legacy headerless chunks.
    legacy_next_index: u32,
}

/// What the receiver surfaces to its caller per handled frame.
#[derive(Debug)]
pub enum ReceiverEvent {
    Progress(TransferProgress),
    Completed(ReceivedFile),
}

/// A fully reassembled file. `warnings` carries any degradation the receiver
/// observed; the bytes are delivered either way.
#[derive(Debug)]
pub struct ReceivedFile {
    pub name: String,
    pub mime_type: String,
    pub declared_size: u64,
    pub bytes: Vec<u8>,
    pub warnings: Vec<TransferWarning>,
}

/// Receiver half of the transfer protocol: a state machine driven by
/// incoming text and binary frames. Sends `chunk-ack` frames itself.
pub struct FileReceiver<C: DataChannel> {
    channel: Arc<C>,
    config: TransferConfig,
    current: Option<IncomingFile>,
}

impl<C: DataChannel> FileReceiver<C> {
    pub fn new(channel: Arc<C>, config: TransferConfig) -> Self {
        Self {
            channel,
            config,
            current: None,
        }
    }

    /// Handle a text control frame from the peer.
    pub fn handle_text(&mut self, text: &str) -> Vec<ReceiverEvent> {
        match serde_json::from_str::<ControlMessage>(text) {
            Ok(ControlMessage::FileMetadata {
                name,
                size,
                mime_type,
                ..
            }) => self.on_metadata(name, size, mime_type),
            Ok(ControlMessage::FileComplete {
                file_name,
                total_chunks,
                checksum,
            }) => self.on_complete(file_name, total_chunks, checksum),
            Ok(ControlMessage::ChunkAck { chunk_index }) => {
                // Informational; the sender does not gate on acks.
                debug!("Peer acknowledged chunk {}", chunk_index);
                Vec::new()
            }
            Err(e) => {
                warn!("Ignoring malformed control frame: {}", e);
                Vec::new()
            }
        }
    }

    /// Handle a binary frame: a tagged data chunk, or a legacy headerless
    /// payload appended in arrival order.
    pub fn handle_binary(&mut self, payload: &[u8]) -> Vec<ReceiverEvent> {
        if self.current.is_none() {
            warn!("Dropping binary frame: no active file metadata");
            return Vec::new();
        }

        match frame::decode_chunk(payload) {
            Ok(chunk) => self.on_chunk(chunk.chunk_index, Some(chunk.total_chunks), chunk.data),
            Err(FrameError::UnknownTag(tag)) => {
                warn!(
                    "Headerless binary frame (tag {:#04x}); appending in arrival order",
                    tag
                );
                let index = match self.current.as_mut() {
                    Some(file) => {
                        let index = file.legacy_next_index;
                        file.legacy_next_index += 1;
                        index
                    }
                    None => return Vec::new(),
                };
                self.on_chunk(index, None, payload.to_vec())
            }
            Err(e) => {
                warn!("Dropping undecodable chunk frame: {}", e);
                Vec::new()
            }
        }
    }

    fn on_metadata(&mut self, name: String, size: u64, mime_type: String) -> Vec<ReceiverEvent> {
        if let Some(stale) = self.current.take() {
            warn!(
                "Metadata for {} arrived while {} was incomplete; dropping the stale transfer",
                name, stale.name
            );
        }
        let expected_chunks = size.div_ceil(self.config.chunk_size as u64) as u32;
        debug!("Receiving {} ({} bytes, {} chunks expected)", name, size, expected_chunks);
        self.current = Some(IncomingFile {
            name,
            declared_size: size,
            mime_type,
            expected_chunks,
            chunks: HashMap::new(),
            bytes_received: 0,
            started_at: Instant::now(),
            legacy_next_index: 0,
        });
        Vec::new()
    }

    fn on_chunk(
        &mut self,
        chunk_index: u32,
        total_chunks: Option<u32>,
        data: Vec<u8>,
    ) -> Vec<ReceiverEvent> {
        let file = match self.current.as_mut() {
            Some(file) => file,
            None => return Vec::new(),
        };

        if let Some(total) = total_chunks {
            if chunk_index >= total {
                warn!(
                    "Dropping chunk {}: index out of range (total {})",
                    chunk_index, total
                );
                return Vec::new();
            }
        }

        if file.chunks.contains_key(&chunk_index) {
            // Duplicate: acknowledge again, keep the first payload.
            debug!("Duplicate chunk {} for {}", chunk_index, file.name);
            Self::ack(&self.channel, chunk_index);
            return Vec::new();
        }

        file.bytes_received += data.len() as u64;
        file.chunks.insert(chunk_index, data);
        Self::ack(&self.channel, chunk_index);

        let percent = if file.declared_size == 0 {
            100.0
        } else {
            file.bytes_received as f64 * 100.0 / file.declared_size as f64
        };
        vec![ReceiverEvent::Progress(TransferProgress {
            file_name: file.name.clone(),
            percent,
            bytes_transferred: file.bytes_received,
            total_bytes: file.declared_size,
            started_at: file.started_at,
        })]
    }

    fn on_complete(
        &mut self,
        file_name: String,
        total_chunks: u32,
        checksum: Option<String>,
    ) -> Vec<ReceiverEvent> {
        let Some(mut file) = self.current.take() else {
            warn!("file-complete for {} without an active transfer", file_name);
            return Vec::new();
        };
        if file_name != file.name {
            warn!(
                "file-complete names {} but the active transfer is {}",
                file_name, file.name
            );
        }

        let expected = if total_chunks > 0 {
            total_chunks
        } else {
            file.expected_chunks
        };

        let mut warnings = Vec::new();
        let mut missing = Vec::new();
        let mut bytes = Vec::with_capacity(file.declared_size as usize);
        for index in 0..expected {
            match file.chunks.remove(&index) {
                Some(chunk) => bytes.extend_from_slice(&chunk),
                None => {
                    // The channel is ordered and reliable; a gap means the far
                    // side misbehaved. Deliver anyway with a zero placeholder.
                    let len = placeholder_len(
                        index,
                        expected,
                        file.declared_size,
                        self.config.chunk_size,
                    );
                    bytes.resize(bytes.len() + len, 0);
                    missing.push(index);
                }
            }
        }

        if !missing.is_empty() {
            warn!(
                "{} reassembled with {} missing chunk(s): {:?}",
                file.name,
                missing.len(),
                missing
            );
            warnings.push(TransferWarning::MissingChunks { indices: missing });
        }
        if bytes.len() as u64 != file.declared_size {
            warn!(
                "{} reassembled to {} bytes, {} declared",
                file.name,
                bytes.len(),
                file.declared_size
            );
            warnings.push(TransferWarning::SizeMismatch {
                declared: file.declared_size,
                actual: bytes.len() as u64,
            });
        }
        if let Some(declared) = checksum {
            let actual = hex::encode(Sha256::digest(&bytes));
            if !declared.eq_ignore_ascii_case(&actual) {
                warn!("{} checksum mismatch", file.name);
                warnings.push(TransferWarning::ChecksumMismatch { declared, actual });
            }
        }

        debug!(
            "Delivered {} ({} bytes, {} warning(s))",
            file.name,
            bytes.len(),
            warnings.len()
        );
        vec![ReceiverEvent::Completed(ReceivedFile {
            name: file.name,
            mime_type: file.mime_type,
            declared_size: file.declared_size,
            bytes,
            warnings,
        })]
    }

    fn ack(channel: &Arc<C>, chunk_index: u32) {
        let ack = ControlMessage::ChunkAck { chunk_index };
        match serde_json::to_string(&ack) {
            Ok(text) => {
                if channel.send_text(&text).is_err() {
                    debug!("Could not ack chunk {}: channel closed", chunk_index);
                }
            }
            Err(e) => debug!("Could not encode ack for chunk {}: {}", chunk_index, e),
        }
    }
}

/// Expected byte length of the chunk at `index`: full chunks everywhere, the
/// declared remainder at the tail.
fn placeholder_len(index: u32, expected: u32, declared_size: u64, chunk_size: usize) -> usize {
    if index + 1 < expected {
        chunk_size
    } else {
        let before = u64::from(expected - 1) * chunk_size as u64;
        declared_size.saturating_sub(before).min(chunk_size as u64) as usize
    }
}
