//! Observed queries.
//!
//! A [`Query`] keeps its entry alive while held, triggers a fetch when the
//! entry is missing or stale, and exposes the current state machine value.

use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::broadcast::error::RecvError;

use super::client::{Fetcher, QueryClient, downcast};
use super::error::QueryError;
use super::keys::QueryKey;
use super::store::{FetchStatus, Status};

/// Per-observer options.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    /// Show the previous key's data while the new key loads for the first time.
    pub keep_previous_data: bool,
}

/// Snapshot of an observed query.
#[derive(Debug)]
pub struct QueryState<T> {
    pub status: Status,
    pub fetch_status: FetchStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<QueryError>,
    /// `data` belongs to the previously observed key.
    pub is_previous_data: bool,
    pub is_stale: bool,
    pub updated_at: Option<OffsetDateTime>,
}

impl<T> QueryState<T> {
    fn idle() -> Self {
        Self {
            status: Status::Idle,
            fetch_status: FetchStatus::Idle,
            data: None,
            error: None,
            is_previous_data: false,
            is_stale: true,
            updated_at: None,
        }
    }

    fn disposed() -> Self {
        Self {
            status: Status::Error,
            error: Some(QueryError::Disposed),
            ..Self::idle()
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == Status::Loading
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch_status == FetchStatus::Fetching
    }
}

/// Keeps the observer count of one key raised while alive.
pub(crate) struct ObserverGuard {
    client: QueryClient,
    key: QueryKey,
}

impl ObserverGuard {
    /// Observe `key`, fetching when the entry has no fresh data.
    pub(crate) fn observe(client: &QueryClient, key: &QueryKey, fetcher: &Fetcher) -> Self {
        let needs_fetch = client.add_observer(key, fetcher);
        if needs_fetch && !client.is_disposed() {
            // The spawned fetch runs on without this handle.
            let _ = client.start_fetch(key, Arc::clone(fetcher));
        }
        Self {
            client: client.clone(),
            key: key.clone(),
        }
    }

    pub(crate) fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        self.client.remove_observer(&self.key);
    }
}

/// A live subscription to one query key.
pub struct Query<T> {
    client: QueryClient,
    key: QueryKey,
    fetcher: Fetcher,
    options: QueryOptions,
    previous: Option<Arc<T>>,
    observer: ObserverGuard,
}

impl QueryClient {
    /// Observe `key`; fetches immediately when the entry is missing or stale.
    pub fn watch<T>(&self, key: QueryKey, fetcher: Fetcher, options: QueryOptions) -> Query<T>
    where
        T: Send + Sync + 'static,
    {
        let observer = ObserverGuard::observe(self, &key, &fetcher);
        Query {
            client: self.clone(),
            key,
            fetcher,
            options,
            previous: None,
            observer,
        }
    }
}

impl<T> Query<T>
where
    T: Send + Sync + 'static,
{
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn state(&self) -> QueryState<T> {
        let stale_time = self.client.config().stale_time;
        let entry = self.client.inspect(&self.key, |entry| {
            (
                entry.status,
                entry.fetch_status,
                entry.data.clone(),
                entry.error.clone(),
                entry.is_stale(stale_time),
                entry.updated_at_utc,
            )
        });
        let Some((status, fetch_status, data, error, is_stale, updated_at)) = entry else {
            return if self.client.is_disposed() {
                QueryState::disposed()
            } else {
                QueryState::idle()
            };
        };

        let data = data.and_then(|value| value.downcast::<T>().ok());
        if data.is_none() && status == Status::Loading && self.options.keep_previous_data {
            if let Some(previous) = &self.previous {
                return QueryState {
                    status: Status::Success,
                    fetch_status,
                    data: Some(Arc::clone(previous)),
                    error: None,
                    is_previous_data: true,
                    is_stale,
                    updated_at,
                };
            }
        }

        QueryState {
            status,
            fetch_status,
            data,
            error,
            is_previous_data: false,
            is_stale,
            updated_at,
        }
    }

    /// Switch to another key, handing the currently shown data over as
    /// placeholder when `keep_previous_data` is set.
    pub fn set_key(&mut self, key: QueryKey, fetcher: Fetcher) {
        if key == self.key {
            return;
        }
        let shown = self.state().data;
        let observer = ObserverGuard::observe(&self.client, &key, &fetcher);
        self.previous = if self.options.keep_previous_data {
            shown
        } else {
            None
        };
        self.key = key;
        self.fetcher = fetcher;
        self.observer = observer;
    }

    /// Fetch the key again regardless of freshness.
    pub async fn refetch(&self) -> Result<Arc<T>, QueryError> {
        self.client.ensure_live()?;
        let value = self
            .client
            .start_fetch(self.observer.key(), Arc::clone(&self.fetcher))
            .await?;
        downcast(&self.key, value)
    }

    /// Fetch the key again in a background task; progress shows in `state`.
    pub fn start_refetch(&self) {
        if self.client.is_disposed() {
            return;
        }
        let _ = self
            .client
            .start_fetch(self.observer.key(), Arc::clone(&self.fetcher));
    }

    /// Wait until no fetch is running for the key, then return its state.
    pub async fn settled(&self) -> QueryState<T> {
        let mut events = self.client.subscribe();
        loop {
            let state = self.state();
            if state.fetch_status == FetchStatus::Idle || self.client.is_disposed() {
                return state;
            }
            match events.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return self.state(),
            }
        }
    }
}
