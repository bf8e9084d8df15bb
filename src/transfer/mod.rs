//! Chunked file transfer over a reliable ordered peer-to-peer channel.
//!
//! The broker never sees any of this traffic; both halves of the engine run
//! inside the peer endpoints once signaling has produced a data channel.

pub mod channel;
pub mod frame;
pub mod receiver;
pub mod sender;

pub use channel::{ChannelError, ChannelMessage, DataChannel, MemoryChannel};
pub use frame::{decode_chunk, encode_chunk, ChunkFrame, ControlMessage, FrameError, CHUNK_FRAME_TAG};
pub use receiver::{FileReceiver, ReceivedFile, ReceiverEvent};
pub use sender::{FileSender, OutgoingFile};

use std::time::{Duration, Instant};
use thiserror::Error;

/// Fixed chunk payload size; the final chunk of a file holds the remainder.
pub const CHUNK_SIZE: usize = 64 * 1024;
/// Outbound-buffer watermark above which the sender defers.
pub const BUFFER_THRESHOLD: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub chunk_size: usize,
    pub buffer_threshold: u64,
    /// How long the sender sleeps before re-checking a saturated buffer.
    pub backoff: Duration,
    /// Pause between consecutive files in the queue.
    pub interfile_pause: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            buffer_threshold: BUFFER_THRESHOLD,
            backoff: Duration::from_millis(100),
            interfile_pause: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("channel closed during transfer")]
    ChannelClosed,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<ChannelError> for TransferError {
    fn from(_: ChannelError) -> Self {
        TransferError::ChannelClosed
    }
}

/// Non-fatal degradations attached to a delivered file. The transport already
/// guarantees ordered reliable delivery, so these indicate protocol misuse on
/// the far side rather than loss; the file is delivered regardless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferWarning {
    MissingChunks { indices: Vec<u32> },
    SizeMismatch { declared: u64, actual: u64 },
    ChecksumMismatch { declared: String, actual: String },
}

/// Point-in-time progress for one file, surfaced at least once per chunk.
#[derive(Debug, Clone)]
pub struct TransferProgress {
    pub file_name: String,
    pub percent: f64,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    pub started_at: Instant,
}

/// Callback invoked with transfer progress.
pub type ProgressFn = Box<dyn Fn(TransferProgress) + Send + Sync>;
