use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::{Instant, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::transfer::channel::DataChannel;
use crate::transfer::frame::{encode_chunk, ControlMessage};
use crate::transfer::{ProgressFn, TransferConfig, TransferError, TransferProgress};

/// One queued outbound file: metadata plus a byte source read lazily in
/// chunk-size slices.
pub struct OutgoingFile {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    /// Milliseconds since the Unix epoch, like the browser reports it.
    pub last_modified: Option<u64>,
    source: Box<dyn Read + Send>,
}

impl OutgoingFile {
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        let size = bytes.len() as u64;
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            last_modified: None,
            source: Box::new(Cursor::new(bytes)),
        }
    }

    pub fn from_path(path: &Path, mime_type: impl Into<String>) -> Result<Self, TransferError> {
        let file = std::fs::File::open(path)?;
        let metadata = file.metadata()?;
        let last_modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        Ok(Self {
            name,
            size: metadata.len(),
            mime_type: mime_type.into(),
            last_modified,
            source: Box::new(file),
        })
    }

    pub fn total_chunks(&self, chunk_size: usize) -> u32 {
        self.size.div_ceil(chunk_size as u64) as u32
    }
}

/// Sends queued files strictly sequentially over a data channel, pacing each
/// chunk against the channel's outbound buffer.
pub struct FileSender<C: DataChannel> {
    channel: Arc<C>,
    config: TransferConfig,
    progress: Option<ProgressFn>,
}

impl<C: DataChannel> FileSender<C> {
    pub fn new(channel: Arc<C>, config: TransferConfig) -> Self {
        Self {
            channel,
            config,
            progress: None,
        }
    }

    /// Registers a progress callback, invoked once per sent chunk.
    pub fn on_progress(&mut self, callback: ProgressFn) {
        self.progress = Some(callback);
    }

    /// Send every queued file in order. A channel failure aborts the current
    /// file and everything still queued behind it.
    pub async fn send_files(&self, files: Vec<OutgoingFile>) -> Result<(), TransferError> {
        let count = files.len();
        for (i, file) in files.into_iter().enumerate() {
            self.send_file(file).await?;
            if i + 1 < count {
                tokio::time::sleep(self.config.interfile_pause).await;
            }
        }
        Ok(())
    }

    async fn send_file(&self, mut file: OutgoingFile) -> Result<(), TransferError> {
        let started_at = Instant::now();
        let total_chunks = file.total_chunks(self.config.chunk_size);
        info!(
            "Sending {} ({} bytes, {} chunks)",
            file.name, file.size, total_chunks
        );

        self.send_control(&ControlMessage::FileMetadata {
            name: file.name.clone(),
            size: file.size,
            mime_type: file.mime_type.clone(),
            last_modified: file.last_modified,
        })?;

        // Hash while chunking so the checksum is ready with the last chunk
        // and transmission never waits on it.
        let mut hasher = Sha256::new();
        let mut sent: u64 = 0;
        let mut chunk_index: u32 = 0;
        let mut buf = vec![0u8; self.config.chunk_size];
        loop {
            let n = read_full(&mut file.source, &mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);

            self.wait_for_capacity().await?;
            self.channel
                .send_binary(&encode_chunk(chunk_index, total_chunks, &buf[..n]))?;

            sent += n as u64;
            chunk_index += 1;
            self.report(&file.name, sent, file.size, started_at);

            if n < self.config.chunk_size {
                break;
            }
        }

        let checksum = hex::encode(hasher.finalize());
        self.send_control(&ControlMessage::FileComplete {
            file_name: file.name.clone(),
            total_chunks,
            checksum: Some(checksum),
        })?;
        debug!("Completed {} ({} bytes in {} chunks)", file.name, sent, chunk_index);
        Ok(())
    }

    /// Defer while the outbound buffer sits above the watermark.
    async fn wait_for_capacity(&self) -> Result<(), TransferError> {
        while self.channel.buffered_amount() > self.config.buffer_threshold {
            if !self.channel.is_open() {
                return Err(TransferError::ChannelClosed);
            }
            tokio::time::sleep(self.config.backoff).await;
        }
        Ok(())
    }

    fn send_control(&self, msg: &ControlMessage) -> Result<(), TransferError> {
        let text = serde_json::to_string(msg)?;
        self.channel.send_text(&text)?;
        Ok(())
    }

    fn report(&self, name: &str, sent: u64, total: u64, started_at: Instant) {
        if let Some(callback) = &self.progress {
            let percent = if total == 0 {
                100.0
            } else {
                sent as f64 * 100.0 / total as f64
            };
            callback(TransferProgress {
                file_name: name.to_string(),
                percent,
                bytes_transferred: sent,
                total_bytes: total,
                started_at,
            });
        }
    }
}

/// Fill the buffer or hit EOF; a plain `read` may return short.
fn read_full(source: &mut dyn Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn total_chunks_rounds_up() {
        let file = OutgoingFile::from_bytes("a", "application/octet-stream", vec![0u8; 100_000]);
        assert_eq!(file.total_chunks(65_536), 2);

        let exact = OutgoingFile::from_bytes("b", "application/octet-stream", vec![0u8; 131_072]);
        assert_eq!(exact.total_chunks(65_536), 2);

        let empty = OutgoingFile::from_bytes("c", "application/octet-stream", Vec::new());
        assert_eq!(empty.total_chunks(65_536), 0);
    }

    #[test]
    fn from_path_reads_metadata() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"hello").unwrap();
        drop(f);

        let file = OutgoingFile::from_path(&path, "text/plain").unwrap();
        assert_eq!(file.name, "notes.txt");
        assert_eq!(file.size, 5);
        assert!(file.last_modified.is_some());
    }
}
