use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One message from the peer. The channel carries text control frames and
/// opaque binary payloads, mirroring the browser data-channel surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl ChannelMessage {
    pub fn len(&self) -> usize {
        match self {
            ChannelMessage::Text(text) => text.len(),
            ChannelMessage::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,
}

/// A reliable, ordered, bidirectional channel as the engine sees it. Sends
/// are non-blocking enqueues; `buffered_amount` reports bytes accepted but
/// not yet handed to the transport, which is what the sender paces against.
pub trait DataChannel: Send + Sync {
    fn send_text(&self, text: &str) -> Result<(), ChannelError>;
    fn send_binary(&self, data: &[u8]) -> Result<(), ChannelError>;
    fn buffered_amount(&self) -> u64;
    fn is_open(&self) -> bool;
}

#[derive(Default)]
struct Queue {
    messages: VecDeque<ChannelMessage>,
    buffered: u64,
    open: bool,
}

/// In-memory loopback: two endpoints cross-wired through shared queues. The
/// outbound buffer only drains when the other endpoint receives, which makes
/// backpressure observable in tests.
pub struct MemoryChannel {
    outbound: Arc<Mutex<Queue>>,
    inbound: Arc<Mutex<Queue>>,
}

impl MemoryChannel {
    pub fn pair() -> (Self, Self) {
        let a = Arc::new(Mutex::new(Queue {
            open: true,
            ..Queue::default()
        }));
        let b = Arc::new(Mutex::new(Queue {
            open: true,
            ..Queue::default()
        }));
        (
            Self {
                outbound: a.clone(),
                inbound: b.clone(),
            },
            Self {
                outbound: b,
                inbound: a,
            },
        )
    }

    /// Receive the next message from the peer, draining its outbound buffer.
    pub fn try_recv(&self) -> Option<ChannelMessage> {
        let mut queue = self.inbound.lock().unwrap();
        let msg = queue.messages.pop_front()?;
        queue.buffered -= msg.len() as u64;
        Some(msg)
    }

    /// Close both directions, as a torn-down peer connection would.
    pub fn close(&self) {
        self.outbound.lock().unwrap().open = false;
        self.inbound.lock().unwrap().open = false;
    }

    fn enqueue(&self, msg: ChannelMessage) -> Result<(), ChannelError> {
        let mut queue = self.outbound.lock().unwrap();
        if !queue.open {
            return Err(ChannelError::Closed);
        }
        queue.buffered += msg.len() as u64;
        queue.messages.push_back(msg);
        Ok(())
    }
}

impl DataChannel for MemoryChannel {
    fn send_text(&self, text: &str) -> Result<(), ChannelError> {
        self.enqueue(ChannelMessage::Text(text.to_string()))
    }

    fn send_binary(&self, data: &[u8]) -> Result<(), ChannelError> {
        self.enqueue(ChannelMessage::Binary(data.to_vec()))
    }

    fn buffered_amount(&self) -> u64 {
        self.outbound.lock().unwrap().buffered
    }

    fn is_open(&self) -> bool {
        self.outbound.lock().unwrap().open
    }
}
