//! Connected-client registry, grounded on
//! `orchestrator::api::ws::pool::ConnectionPool` but simplified to what the
//! broadcaster needs: a send queue per client plus a creation/message
//! counter for observability. No connection cap — the broadcaster is a
//! thin fan-out, not a resource the executor depends on, so refusing a
//! client here has no correctness consequence for a run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

const CLIENT_QUEUE_CAPACITY: usize = 256;

/// One connected WebSocket client's outbound queue.
pub struct ClientHandle {
    pub id: String,
    tx: tokio::sync::mpsc::Sender<Value>,
    messages_sent: Arc<AtomicU64>,
}

impl ClientHandle {
    /// Enqueues `payload` for delivery. Drops it with a warn log if the
    /// client's queue is full or the client has disconnected — mirrors the
    /// Event Bus's own back-pressure policy (`workflow_events::memory`):
    /// a slow or gone client never blocks the fan-out loop.
    pub fn send(&self, payload: Value) {
        match self.tx.try_send(payload) {
            Ok(()) => {
                self.messages_sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(client_id = %self.id, "client queue full, dropping event");
            }
            Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(client_id = %self.id, "client disconnected, dropping event");
            }
        }
    }
}

/// Registry of connected clients, shared between the accept loop (one
/// `register`/`unregister` pair per connection) and the bus-subscriber fan-
/// out loop (one `broadcast` call per event).
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<DashMap<String, (Arc<ClientHandle>, Arc<AtomicU64>)>>,
    total_connected: Arc<AtomicU64>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new client and returns its handle plus the receiving
    /// half of its outbound queue, which the caller's WebSocket send task
    /// drains.
    pub fn register(&self) -> (Arc<ClientHandle>, tokio::sync::mpsc::Receiver<Value>) {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = tokio::sync::mpsc::channel(CLIENT_QUEUE_CAPACITY);
        let messages_sent = Arc::new(AtomicU64::new(0));
        let handle = Arc::new(ClientHandle { id: id.clone(), tx, messages_sent: messages_sent.clone() });
        self.clients.insert(id, (handle.clone(), messages_sent));
        self.total_connected.fetch_add(1, Ordering::Relaxed);
        (handle, rx)
    }

    pub fn unregister(&self, client_id: &str) {
        self.clients.remove(client_id);
    }

    pub fn active_count(&self) -> usize {
        self.clients.len()
    }

    pub fn total_connected(&self) -> u64 {
        self.total_connected.load(Ordering::Relaxed)
    }

    /// Sends `payload` to every currently-registered client for whom
    /// `filters` passes it.
    pub fn broadcast(&self, payload: &Value, filters: &crate::filters::FilterManager) {
        for entry in self.clients.iter() {
            let (handle, _) = entry.value();
            if filters.should_send(&handle.id, payload) {
                handle.send(payload.clone());
            }
        }
    }
}
