//! Query cache event system.
//!
//! Every state change of a cache entry or mutation is broadcast to
//! subscribers so views can re-render without polling.

use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::debug;

use super::keys::QueryKey;

const CHANNEL_CAPACITY: usize = 256;

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

/// Cache event with ordering support.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    pub epoch: Epoch,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Kinds of cache changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A fetch for the key started.
    FetchStarted { key: QueryKey },
    /// Data or error for the key was stored.
    QueryUpdated { key: QueryKey },
    /// The key was marked stale.
    QueryInvalidated { key: QueryKey },
    /// The unobserved entry was garbage collected.
    QueryRemoved { key: QueryKey },
    /// A mutation changed state.
    MutationUpdated { mutation_id: u64 },
    /// The client was disposed.
    Disposed,
}

/// Broadcast fan-out of cache events.
pub struct EventBus {
    sender: broadcast::Sender<CacheEvent>,
    epoch_counter: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            epoch_counter: AtomicU64::new(0),
        }
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Publish an event to every live subscriber.
    pub fn publish(&self, kind: EventKind) {
        let event = CacheEvent::new(kind, self.next_epoch());
        debug!(
            event_epoch = event.epoch,
            event_kind = ?event.kind,
            "Query cache event published"
        );
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
