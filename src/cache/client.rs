//! The query client: one shared handle to the keyed query cache.
//!
//! Fetches run as spawned tasks so they complete even when every requester
//! goes away. Results land in the [`EntryStore`] before the in-flight handle is
//! released, so a follow-up read always sees the settled entry.

use std::any::Any;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use metrics::{counter, histogram};
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::CacheConfig;
use super::error::QueryError;
use super::events::{CacheEvent, EventBus, EventKind};
use super::inflight::{FetchGuard, InFlightFetches, Joined, SharedFetch};
use super::keys::{QueryFilter, QueryKey};
use super::store::{Entry, EntrySnapshot, EntryStore, FetchStatus, Status};

/// Type-erased cached value.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// Future produced by a [`Fetcher`].
pub type FetchFuture = BoxFuture<'static, Result<AnyValue, QueryError>>;

/// Zero-argument asynchronous function producing a query's value.
pub type Fetcher = Arc<dyn Fn() -> FetchFuture + Send + Sync>;

/// Wrap a typed fetch function into a [`Fetcher`].
pub fn fetcher<T, E, F, Fut>(fetch: F) -> Fetcher
where
    T: Send + Sync + 'static,
    E: StdError + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    Arc::new(move || {
        let pending = fetch();
        async move {
            pending
                .await
                .map(|value| Arc::new(value) as AnyValue)
                .map_err(QueryError::fetch)
        }
        .boxed()
    })
}

pub(crate) fn downcast<T>(key: &QueryKey, value: AnyValue) -> Result<Arc<T>, QueryError>
where
    T: Send + Sync + 'static,
{
    value
        .downcast::<T>()
        .map_err(|_| QueryError::TypeMismatch { key: key.clone() })
}

/// Cheaply clonable handle to the query cache.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    config: CacheConfig,
    store: EntryStore,
    in_flight: InFlightFetches,
    events: EventBus,
    disposed: AtomicBool,
    next_mutation_id: AtomicU64,
}

impl QueryClient {
    pub fn new(config: CacheConfig) -> Self {
        info!(
            stale_time_ms = config.stale_time.as_millis() as u64,
            gc_time_ms = config.gc_time.as_millis() as u64,
            retry = config.retry,
            "Query client created"
        );
        Self {
            inner: Arc::new(ClientInner {
                config,
                store: EntryStore::new(),
                in_flight: InFlightFetches::new(),
                events: EventBus::new(),
                disposed: AtomicBool::new(false),
                next_mutation_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Subscribe to every subsequent cache event.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Drop every entry and reject further fetches. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let dropped = self.inner.store.len();
        self.inner.store.clear();
        info!(dropped_entries = dropped, "Query client disposed");
        self.inner.events.publish(EventKind::Disposed);
    }

    /// Return cached data for `key` when fresh, otherwise fetch it, joining any
    /// fetch already running for the key.
    pub async fn fetch_query<T>(&self, key: QueryKey, fetcher: Fetcher) -> Result<Arc<T>, QueryError>
    where
        T: Send + Sync + 'static,
    {
        self.ensure_live()?;
        if let Some(value) = self.fresh_data(&key) {
            counter!("ipsum_query_cache_hit_total").increment(1);
            debug!(key = %key, "Query cache hit");
            return downcast(&key, value);
        }
        counter!("ipsum_query_cache_miss_total").increment(1);
        self.register_fetcher(&key, &fetcher);
        let value = self.start_fetch(&key, fetcher).await?;
        downcast(&key, value)
    }

    /// Warm `key` in the background of the caller. Does nothing when the entry
    /// is fresh or already fetching; failures are logged, never returned.
    pub async fn prefetch_query(&self, key: QueryKey, fetcher: Fetcher) {
        if self.is_disposed() {
            return;
        }
        if self.fresh_data(&key).is_some() || self.inner.in_flight.contains(&key) {
            debug!(key = %key, "Prefetch skipped");
            return;
        }
        self.register_fetcher(&key, &fetcher);
        if let Err(error) = self.start_fetch(&key, fetcher).await {
            debug!(key = %key, error = %error, "Prefetch failed");
        }
    }

    /// Mark matching entries stale and refetch the observed ones, waiting for
    /// those refetches to settle.
    pub async fn invalidate_queries(&self, filter: &QueryFilter) {
        if self.is_disposed() {
            return;
        }
        let mut refetches = Vec::new();
        for key in self.inner.store.matching(filter) {
            let refetch = self
                .inner
                .store
                .update_existing(&key, |entry| {
                    entry.invalidated = true;
                    entry.invalidation_epoch += 1;
                    if entry.observers > 0 {
                        entry.fetcher.clone()
                    } else {
                        None
                    }
                })
                .flatten();
            info!(key = %key, observed = refetch.is_some(), "Query invalidated");
            self.inner
                .events
                .publish(EventKind::QueryInvalidated { key: key.clone() });
            if let Some(fetcher) = refetch {
                refetches.push(self.refetch_after_invalidation(key, fetcher));
            }
        }
        join_all(refetches).await;
    }

    /// Current data for `key`, fresh or not.
    pub fn get_query_data<T>(&self, key: &QueryKey) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let value = self.inner.store.read(key, |entry| entry.data.clone()).flatten()?;
        value.downcast::<T>().ok()
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.inner.in_flight.contains(key)
    }

    pub fn entry_count(&self) -> usize {
        self.inner.store.len()
    }

    /// Point-in-time view of every entry, ordered by key.
    pub fn snapshot(&self) -> Vec<EntrySnapshot> {
        self.inner.store.snapshot(self.inner.config.stale_time)
    }

    pub(crate) fn ensure_live(&self) -> Result<(), QueryError> {
        if self.is_disposed() {
            Err(QueryError::Disposed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn publish(&self, kind: EventKind) {
        self.inner.events.publish(kind);
    }

    pub(crate) fn next_mutation_id(&self) -> u64 {
        self.inner.next_mutation_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn downgrade(&self) -> Weak<ClientInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<ClientInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub(crate) fn inspect<R>(&self, key: &QueryKey, f: impl FnOnce(&Entry) -> R) -> Option<R> {
        self.inner.store.read(key, f)
    }

    pub(crate) fn in_flight(&self, key: &QueryKey) -> Option<SharedFetch> {
        self.inner.in_flight.get(key)
    }

    /// Register an observer of `key`. Returns true when the entry has no data
    /// or its data is stale, i.e. the observer should trigger a fetch.
    pub(crate) fn add_observer(&self, key: &QueryKey, fetcher: &Fetcher) -> bool {
        let stale_time = self.inner.config.stale_time;
        let needs_fetch = self.inner.store.update(key, |entry| {
            entry.observers += 1;
            entry.fetcher = Some(Arc::clone(fetcher));
            entry.data.is_none() || entry.is_stale(stale_time)
        });
        debug!(key = %key, needs_fetch, "Query observer added");
        needs_fetch
    }

    pub(crate) fn remove_observer(&self, key: &QueryKey) {
        let last = self
            .inner
            .store
            .update_existing(key, |entry| {
                entry.observers = entry.observers.saturating_sub(1);
                entry.observers == 0
            })
            .unwrap_or(false);
        debug!(key = %key, last, "Query observer removed");
        if last {
            self.schedule_gc(key);
        }
    }

    /// Start a fetch for `key` or attach to the one already running.
    pub(crate) fn start_fetch(&self, key: &QueryKey, fetcher: Fetcher) -> SharedFetch {
        match self
            .inner
            .in_flight
            .join_or_start(key, |guard| self.spawn_fetch(key.clone(), fetcher, guard))
        {
            Joined::Started(fetch) => fetch,
            Joined::Coalesced(fetch) => {
                counter!("ipsum_query_fetch_coalesced_total").increment(1);
                debug!(key = %key, "Joined in-flight fetch");
                fetch
            }
        }
    }

    fn fresh_data(&self, key: &QueryKey) -> Option<AnyValue> {
        let stale_time = self.inner.config.stale_time;
        self.inner
            .store
            .read(key, |entry| {
                if entry.has_fresh_data(stale_time) {
                    entry.data.clone()
                } else {
                    None
                }
            })
            .flatten()
    }

    fn register_fetcher(&self, key: &QueryKey, fetcher: &Fetcher) {
        self.inner.store.update(key, |entry| {
            entry.fetcher = Some(Arc::clone(fetcher));
        });
    }

    async fn refetch_after_invalidation(&self, key: QueryKey, fetcher: Fetcher) {
        // A fetch that started before the invalidation cannot satisfy it.
        if let Some(running) = self.inner.in_flight.get(&key) {
            let _ = running.await;
        }
        if let Err(error) = self.start_fetch(&key, fetcher).await {
            debug!(key = %key, error = %error, "Refetch after invalidation failed");
        }
    }

    fn spawn_fetch(&self, key: QueryKey, fetcher: Fetcher, guard: FetchGuard) -> SharedFetch {
        let epoch = self.inner.store.update(&key, |entry| {
            entry.fetch_status = FetchStatus::Fetching;
            if entry.data.is_none() {
                entry.status = Status::Loading;
            }
            entry.invalidation_epoch
        });
        counter!("ipsum_query_fetch_total").increment(1);
        info!(key = %key, "Query fetch started");
        self.inner
            .events
            .publish(EventKind::FetchStarted { key: key.clone() });

        let client = self.clone();
        let task = async move {
            let _guard = guard;
            let started = Instant::now();
            let result = client.run_with_retry(&key, &fetcher).await;
            histogram!("ipsum_query_fetch_ms").record(started.elapsed().as_secs_f64() * 1000.0);
            client.settle(&key, epoch, &result);
            result
        };

        tokio::spawn(task)
            .map(|joined| {
                joined.unwrap_or_else(|error| Err(QueryError::Aborted(error.to_string())))
            })
            .boxed()
            .shared()
    }

    async fn run_with_retry(&self, key: &QueryKey, fetcher: &Fetcher) -> Result<AnyValue, QueryError> {
        let retries = self.inner.config.retry;
        let mut attempt = 0;
        loop {
            match fetcher().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < retries && !self.is_disposed() => {
                    let delay = self.inner.config.retry_delay_for(attempt);
                    self.inner
                        .store
                        .update_existing(key, |entry| entry.failure_count += 1);
                    warn!(
                        key = %key,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Query fetch failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn settle(&self, key: &QueryKey, epoch: u64, result: &Result<AnyValue, QueryError>) {
        if self.is_disposed() {
            debug!(key = %key, "Discarding fetch result of disposed client");
            return;
        }
        let unobserved = self.inner.store.update(key, |entry| {
            entry.fetch_status = FetchStatus::Idle;
            match result {
                Ok(value) => {
                    entry.data = Some(Arc::clone(value));
                    entry.error = None;
                    entry.status = Status::Success;
                    entry.failure_count = 0;
                    entry.updated_at = Some(Instant::now());
                    entry.updated_at_utc = Some(OffsetDateTime::now_utc());
                    if entry.invalidation_epoch == epoch {
                        entry.invalidated = false;
                    }
                }
                Err(error) => {
                    entry.error = Some(error.clone());
                    entry.status = Status::Error;
                    entry.failure_count += 1;
                }
            }
            entry.observers == 0
        });

        match result {
            Ok(_) => info!(key = %key, "Query fetch succeeded"),
            Err(error) => {
                counter!("ipsum_query_fetch_error_total").increment(1);
                warn!(key = %key, error = %error, "Query fetch failed");
            }
        }
        self.inner
            .events
            .publish(EventKind::QueryUpdated { key: key.clone() });

        if unobserved {
            self.schedule_gc(key);
        }
    }

    /// Evict `key` after `gc_time` unless it gains an observer or a newer
    /// eviction is scheduled in the meantime.
    fn schedule_gc(&self, key: &QueryKey) {
        // Observers may be dropped after the runtime is gone; the entry then
        // lives until `dispose`.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(key = %key, "No runtime to schedule query eviction");
            return;
        };
        let Some(gc_epoch) = self.inner.store.update_existing(key, |entry| {
            entry.gc_epoch += 1;
            entry.gc_epoch
        }) else {
            return;
        };
        let gc_time = self.inner.config.gc_time;
        let weak = self.downgrade();
        let key = key.clone();
        runtime.spawn(async move {
            tokio::time::sleep(gc_time).await;
            let Some(client) = QueryClient::upgrade(&weak) else {
                return;
            };
            let removed = client.inner.store.remove_if(&key, |entry| {
                entry.gc_epoch == gc_epoch
                    && entry.observers == 0
                    && entry.fetch_status == FetchStatus::Idle
            });
            if removed {
                info!(key = %key, "Query evicted after gc_time");
                client
                    .inner
                    .events
                    .publish(EventKind::QueryRemoved { key });
            }
        });
    }
}
