//! Live connection registry
//!
//! Maps connection ids to the outbound queue of each connection's writer
//! task. Has its own lock, independent of the post store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Messages a connection may have queued before it counts as unreachable
pub const OUTBOUND_CAPACITY: usize = 64;

/// Bounded outbound queue of one connection
///
/// A connection is evicted once its queue is full; the connection task
/// watches [`Outbound::evicted`] and closes the transport.
#[derive(Debug, Clone)]
pub struct Outbound {
    queue: mpsc::Sender<Message>,
    evicted: Arc<Notify>,
}

impl Outbound {
    /// Queue with room for `capacity` messages, plus its receiving end
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (queue, rx) = mpsc::channel(capacity.max(1));
        let outbound = Self {
            queue,
            evicted: Arc::new(Notify::new()),
        };
        (outbound, rx)
    }

    /// Queue a message without waiting; false when the queue is full or closed
    pub fn try_send(&self, message: Message) -> bool {
        match self.queue.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.evict();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    fn evict(&self) {
        self.evicted.notify_one();
    }

    /// Completes once the connection has been evicted
    pub async fn evicted(&self) {
        self.evicted.notified().await;
    }
}

/// Registered connections, shared between the accept loop and the broadcaster
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<Mutex<HashMap<String, Outbound>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: &str, outbound: Outbound) {
        self.connections.lock().insert(id.to_string(), outbound);
    }

    /// Remove a connection; returns false if it was already gone
    pub fn deregister(&self, id: &str) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.connections.lock().contains_key(id)
    }

    /// Queue a text message on every connection
    ///
    /// Connections whose writer has gone away or whose queue is full are
    /// dropped. Returns how many connections the message was queued for.
    pub fn broadcast(&self, text: &str) -> usize {
        let mut connections = self.connections.lock();
        connections.retain(|id, outbound| {
            if outbound.queue.is_closed() {
                debug!("Dropping closed connection {}", id);
                return false;
            }
            let queued = outbound.try_send(Message::Text(text.to_string()));
            if !queued {
                warn!("Dropping connection {}: outbound queue full", id);
            }
            queued
        });
        connections.len()
    }
}
