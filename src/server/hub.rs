//! WebSocket fan-out for detection payloads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::pipeline::Broadcaster;

/// Broadcast hub shared by the pipeline (publisher side) and every
/// WebSocket session (one receiver each).
#[derive(Clone)]
pub struct WsHub {
    tx: broadcast::Sender<String>,
    next_client: Arc<AtomicU64>,
}

impl WsHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            next_client: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register a subscriber and hand out its id for connection logging.
    pub fn subscribe(&self) -> (u64, broadcast::Receiver<String>) {
        let id = self.next_client.fetch_add(1, Ordering::Relaxed);
        (id, self.tx.subscribe())
    }
}

impl Broadcaster for WsHub {
    fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn broadcast(&self, payload: String) {
        // Err only means every receiver went away since the count was taken.
        let _ = self.tx.send(payload);
    }
}
