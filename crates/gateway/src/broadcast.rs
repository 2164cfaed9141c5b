//! Fan-out of inbox notifications to connected chat panels.

use std::sync::atomic::{AtomicU64, Ordering};

use {
    async_trait::async_trait,
    serde::Serialize,
    tokio::sync::broadcast,
    tracing::{debug, warn},
};

use chatdesk_inbox::{InboxEvent, NotificationSink};

/// Frames a slow client may fall behind before it starts losing events.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Serialize)]
struct EventFrame<'a> {
    r#type: &'static str,
    seq: u64,
    event: &'a InboxEvent,
}

/// Serializes each event once and hands the frame to every subscriber.
pub struct Broadcaster {
    tx: broadcast::Sender<String>,
    seq: AtomicU64,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            seq: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl NotificationSink for Broadcaster {
    async fn notify(&self, event: InboxEvent) {
        let frame = EventFrame {
            r#type: "event",
            seq: self.next_seq(),
            event: &event,
        };
        let json = match serde_json::to_string(&frame) {
            Ok(j) => j,
            Err(e) => {
                warn!("failed to serialize inbox event: {e}");
                return;
            },
        };
        // No subscribers is the normal idle state.
        let delivered = self.tx.send(json).unwrap_or(0);
        debug!(seq = frame.seq, clients = delivered, ?event, "broadcast inbox event");
    }
}
