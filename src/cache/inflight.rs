//! Per-key in-flight fetch registry.
//!
//! At most one fetch runs per key; later requesters attach to the shared
//! handle of the running fetch.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};

use super::client::AnyValue;
use super::error::QueryError;
use super::keys::QueryKey;

pub(crate) type SharedFetch = Shared<BoxFuture<'static, Result<AnyValue, QueryError>>>;

struct InFlightFetch {
    id: u64,
    future: SharedFetch,
}

/// Tracks the running fetch of every key.
#[derive(Default, Clone)]
pub(crate) struct InFlightFetches {
    fetches: Arc<DashMap<QueryKey, InFlightFetch>>,
    next_id: Arc<AtomicU64>,
}

/// Outcome of [`InFlightFetches::join_or_start`].
pub(crate) enum Joined {
    Started(SharedFetch),
    Coalesced(SharedFetch),
}

impl InFlightFetches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to the running fetch for `key`, or register the one built by
    /// `start`. The guard handed to `start` unregisters the fetch on drop.
    pub fn join_or_start(
        &self,
        key: &QueryKey,
        start: impl FnOnce(FetchGuard) -> SharedFetch,
    ) -> Joined {
        use dashmap::mapref::entry::Entry;

        match self.fetches.entry(key.clone()) {
            Entry::Occupied(occupied) => Joined::Coalesced(occupied.get().future.clone()),
            Entry::Vacant(vacant) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                let guard = FetchGuard {
                    key: key.clone(),
                    id,
                    fetches: Arc::clone(&self.fetches),
                };
                let future = start(guard);
                vacant.insert(InFlightFetch {
                    id,
                    future: future.clone(),
                });
                Joined::Started(future)
            }
        }
    }

    pub fn get(&self, key: &QueryKey) -> Option<SharedFetch> {
        self.fetches.get(key).map(|fetch| fetch.future.clone())
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.fetches.contains_key(key)
    }
}

pub(crate) struct FetchGuard {
    key: QueryKey,
    id: u64,
    fetches: Arc<DashMap<QueryKey, InFlightFetch>>,
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        let id = self.id;
        self.fetches.remove_if(&self.key, |_, fetch| fetch.id == id);
    }
}
