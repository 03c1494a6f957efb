//! Debug overlay state: open flag plus live access to the cache entries.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::cache::{EntrySnapshot, QueryClient};

#[derive(Clone)]
pub struct Devtools {
    client: QueryClient,
    open: Arc<AtomicBool>,
}

impl Devtools {
    pub fn new(client: QueryClient, initial_open: bool) -> Self {
        Self {
            client,
            open: Arc::new(AtomicBool::new(initial_open)),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Flip the overlay and return the new state.
    pub fn toggle(&self) -> bool {
        let open = !self.open.fetch_xor(true, Ordering::SeqCst);
        debug!(open, "Debug overlay toggled");
        open
    }

    pub fn entries(&self) -> Vec<EntrySnapshot> {
        self.client.snapshot()
    }
}
