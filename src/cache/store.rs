//! Keyed entry storage for the query client.

use std::collections::HashMap;
use std::sync::RwLock;

use time::OffsetDateTime;
use tokio::time::Instant;

use super::client::{AnyValue, Fetcher};
use super::error::QueryError;
use super::keys::{QueryFilter, QueryKey};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// Lifecycle of the data held by a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    Loading,
    Error,
    Success,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Error => "error",
            Self::Success => "success",
        }
    }
}

/// Whether a fetch for the query is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
    #[default]
    Idle,
    Fetching,
}

impl FetchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
        }
    }
}

#[derive(Default)]
pub(crate) struct Entry {
    pub data: Option<AnyValue>,
    pub error: Option<QueryError>,
    pub status: Status,
    pub fetch_status: FetchStatus,
    pub invalidated: bool,
    /// Bumped on every invalidation; a fetch only clears `invalidated` when
    /// no invalidation arrived while it ran.
    pub invalidation_epoch: u64,
    pub updated_at: Option<Instant>,
    pub updated_at_utc: Option<OffsetDateTime>,
    pub failure_count: u32,
    pub observers: usize,
    pub fetcher: Option<Fetcher>,
    /// Bumped whenever eviction is (re)scheduled; stale timers compare it.
    pub gc_epoch: u64,
}

impl Entry {
    pub fn is_stale(&self, stale_time: std::time::Duration) -> bool {
        if self.invalidated {
            return true;
        }
        match self.updated_at {
            Some(at) => at.elapsed() >= stale_time,
            None => true,
        }
    }

    pub fn has_fresh_data(&self, stale_time: std::time::Duration) -> bool {
        self.data.is_some() && !self.is_stale(stale_time)
    }
}

/// Read-only view of one entry, used by the debug overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub key: QueryKey,
    pub status: Status,
    pub fetch_status: FetchStatus,
    pub stale: bool,
    pub observers: usize,
    pub failure_count: u32,
    pub updated_at: Option<OffsetDateTime>,
}

pub(crate) struct EntryStore {
    entries: RwLock<HashMap<QueryKey, Entry>>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Run `f` on the entry for `key`, creating an idle entry when missing.
    pub fn update<R>(&self, key: &QueryKey, f: impl FnOnce(&mut Entry) -> R) -> R {
        let mut entries = rw_write(&self.entries, SOURCE, "update");
        if !entries.contains_key(key) {
            entries.insert(key.clone(), Entry::default());
            record_size(entries.len());
        }
        match entries.get_mut(key) {
            Some(entry) => f(entry),
            None => f(&mut Entry::default()),
        }
    }

    /// Run `f` on an existing entry only.
    pub fn update_existing<R>(
        &self,
        key: &QueryKey,
        f: impl FnOnce(&mut Entry) -> R,
    ) -> Option<R> {
        let mut entries = rw_write(&self.entries, SOURCE, "update_existing");
        entries.get_mut(key).map(f)
    }

    pub fn read<R>(&self, key: &QueryKey, f: impl FnOnce(&Entry) -> R) -> Option<R> {
        let entries = rw_read(&self.entries, SOURCE, "read");
        entries.get(key).map(f)
    }

    /// Remove `key` when `predicate` holds for its entry.
    pub fn remove_if(&self, key: &QueryKey, predicate: impl FnOnce(&Entry) -> bool) -> bool {
        let mut entries = rw_write(&self.entries, SOURCE, "remove_if");
        let remove = entries.get(key).is_some_and(predicate);
        if remove {
            entries.remove(key);
            record_size(entries.len());
        }
        remove
    }

    pub fn matching(&self, filter: &QueryFilter) -> Vec<QueryKey> {
        let entries = rw_read(&self.entries, SOURCE, "matching");
        let mut keys: Vec<QueryKey> = entries
            .keys()
            .filter(|key| filter.matches(key))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn snapshot(&self, stale_time: std::time::Duration) -> Vec<EntrySnapshot> {
        let entries = rw_read(&self.entries, SOURCE, "snapshot");
        let mut rows: Vec<EntrySnapshot> = entries
            .iter()
            .map(|(key, entry)| EntrySnapshot {
                key: key.clone(),
                status: entry.status,
                fetch_status: entry.fetch_status,
                stale: entry.is_stale(stale_time),
                observers: entry.observers,
                failure_count: entry.failure_count,
                updated_at: entry.updated_at_utc,
            })
            .collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        rows
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn clear(&self) {
        let mut entries = rw_write(&self.entries, SOURCE, "clear");
        entries.clear();
        record_size(0);
    }
}

fn record_size(len: usize) {
    metrics::gauge!("ipsum_query_cache_entries").set(len as f64);
}
