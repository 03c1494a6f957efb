use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use ipsum::cache::{
    CacheConfig, EventKind, Fetcher, Query, QueryClient, QueryError, QueryFilter, QueryKey,
    QueryOptions, Status, fetcher,
};

#[derive(Debug, thiserror::Error)]
#[error("service unavailable")]
struct Unavailable;

fn config() -> CacheConfig {
    CacheConfig {
        stale_time: Duration::from_secs(60),
        gc_time: Duration::from_secs(300),
        retry: 0,
        ..CacheConfig::default()
    }
}

/// Returns the call number, after `delay`.
fn numbered(calls: &Arc<AtomicU32>, delay: Duration) -> Fetcher {
    let calls = Arc::clone(calls);
    fetcher(move || {
        let calls = Arc::clone(&calls);
        async move {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(delay).await;
            Ok::<_, Unavailable>(call)
        }
    })
}

fn posts(page: u32) -> QueryKey {
    QueryKey::new("posts").with(page)
}

#[tokio::test]
async fn concurrent_requests_share_one_fetch() {
    let client = QueryClient::new(config());
    let calls = Arc::new(AtomicU32::new(0));
    let key = QueryKey::new("comments").with(3u64);
    let slow = numbered(&calls, Duration::from_millis(50));

    let (first, second) = tokio::join!(
        client.fetch_query::<u32>(key.clone(), Arc::clone(&slow)),
        client.fetch_query::<u32>(key.clone(), slow),
    );

    let first = first.expect("first requester");
    let second = second.expect("second requester");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert!(!client.is_fetching(&key));
}

#[tokio::test]
async fn prefetch_of_fresh_or_fetching_key_is_a_no_op() {
    let client = QueryClient::new(config());
    let calls = Arc::new(AtomicU32::new(0));
    let slow = numbered(&calls, Duration::from_millis(20));

    tokio::join!(
        client.prefetch_query(posts(1), Arc::clone(&slow)),
        client.prefetch_query(posts(1), Arc::clone(&slow)),
    );
    client.prefetch_query(posts(1), slow).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.get_query_data::<u32>(&posts(1)).as_deref(), Some(&1));
}

#[tokio::test]
async fn family_invalidation_refetches_observed_and_stales_the_rest() {
    let client = QueryClient::new(config());
    let observed_calls = Arc::new(AtomicU32::new(0));
    let cached_calls = Arc::new(AtomicU32::new(0));
    let comments_calls = Arc::new(AtomicU32::new(0));

    let observed: Query<u32> = client.watch(
        posts(0),
        numbered(&observed_calls, Duration::ZERO),
        QueryOptions::default(),
    );
    observed.settled().await;
    client
        .prefetch_query(posts(1), numbered(&cached_calls, Duration::ZERO))
        .await;
    let comments_key = QueryKey::new("comments").with(1u64);
    client
        .prefetch_query(comments_key.clone(), numbered(&comments_calls, Duration::ZERO))
        .await;

    client
        .invalidate_queries(&QueryFilter::family(QueryKey::new("posts")))
        .await;

    assert_eq!(observed_calls.load(Ordering::SeqCst), 2);
    assert_eq!(observed.state().data.as_deref(), Some(&2));
    assert_eq!(cached_calls.load(Ordering::SeqCst), 1);

    let snapshot = client.snapshot();
    let stale = |key: &QueryKey| {
        snapshot
            .iter()
            .find(|entry| &entry.key == key)
            .map(|entry| entry.stale)
    };
    assert_eq!(stale(&posts(0)), Some(false));
    assert_eq!(stale(&posts(1)), Some(true));
    assert_eq!(stale(&comments_key), Some(false));

    let refreshed = client
        .fetch_query::<u32>(posts(1), numbered(&cached_calls, Duration::ZERO))
        .await
        .expect("refetch of stale entry");
    assert_eq!(*refreshed, 2);
}

#[tokio::test]
async fn invalidation_during_fetch_triggers_another_fetch() {
    let client = QueryClient::new(config());
    let calls = Arc::new(AtomicU32::new(0));
    let query: Query<u32> = client.watch(
        posts(0),
        numbered(&calls, Duration::from_millis(30)),
        QueryOptions::default(),
    );
    assert!(query.state().is_fetching());

    client
        .invalidate_queries(&QueryFilter::exact(posts(0)))
        .await;

    let state = query.settled().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(state.data.as_deref(), Some(&2));
    assert!(!state.is_stale);
}

#[tokio::test(start_paused = true)]
async fn unobserved_entries_are_evicted_after_gc_time() {
    let client = QueryClient::new(config());
    let calls = Arc::new(AtomicU32::new(0));

    client
        .prefetch_query(posts(1), numbered(&calls, Duration::ZERO))
        .await;
    let query: Query<u32> = client.watch(
        posts(0),
        numbered(&calls, Duration::ZERO),
        QueryOptions::default(),
    );
    query.settled().await;
    assert_eq!(client.entry_count(), 2);

    let mut events = client.subscribe();
    tokio::time::sleep(Duration::from_secs(301)).await;

    assert_eq!(client.entry_count(), 1);
    assert!(client.get_query_data::<u32>(&posts(1)).is_none());
    let removed = events.recv().await.expect("removal event");
    assert_eq!(removed.kind, EventKind::QueryRemoved { key: posts(1) });

    drop(query);
    tokio::time::sleep(Duration::from_secs(301)).await;
    assert_eq!(client.entry_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn regaining_an_observer_cancels_eviction() {
    let client = QueryClient::new(config());
    let calls = Arc::new(AtomicU32::new(0));

    let first: Query<u32> = client.watch(
        posts(0),
        numbered(&calls, Duration::ZERO),
        QueryOptions::default(),
    );
    first.settled().await;
    drop(first);

    tokio::time::sleep(Duration::from_secs(200)).await;
    let second: Query<u32> = client.watch(
        posts(0),
        numbered(&calls, Duration::ZERO),
        QueryOptions::default(),
    );
    tokio::time::sleep(Duration::from_secs(200)).await;

    assert_eq!(client.entry_count(), 1);
    assert!(second.state().is_success());
}

#[tokio::test]
async fn events_follow_the_fetch_lifecycle() {
    let client = QueryClient::new(config());
    let mut events = client.subscribe();
    let calls = Arc::new(AtomicU32::new(0));

    client
        .fetch_query::<u32>(posts(0), numbered(&calls, Duration::ZERO))
        .await
        .expect("fetch");

    let started = events.recv().await.expect("started");
    let updated = events.recv().await.expect("updated");
    assert_eq!(started.kind, EventKind::FetchStarted { key: posts(0) });
    assert_eq!(updated.kind, EventKind::QueryUpdated { key: posts(0) });
    assert!(updated.epoch > started.epoch);
}

#[tokio::test]
async fn failed_fetch_keeps_previous_data() {
    let client = QueryClient::new(config());
    let calls = Arc::new(AtomicU32::new(0));
    client
        .fetch_query::<u32>(posts(0), numbered(&calls, Duration::ZERO))
        .await
        .expect("first fetch");

    client
        .invalidate_queries(&QueryFilter::exact(posts(0)))
        .await;
    let failing = fetcher(|| async { Err::<u32, _>(Unavailable) });
    let error = client
        .fetch_query::<u32>(posts(0), failing)
        .await
        .expect_err("failing refetch");

    assert_eq!(error.to_string(), "service unavailable");
    assert_eq!(client.get_query_data::<u32>(&posts(0)).as_deref(), Some(&1));
    let entry = client
        .snapshot()
        .into_iter()
        .find(|entry| entry.key == posts(0))
        .expect("entry");
    assert_eq!(entry.status, Status::Error);
}

#[tokio::test]
async fn dispose_drops_entries_and_rejects_work() {
    let client = QueryClient::new(config());
    let calls = Arc::new(AtomicU32::new(0));
    client
        .fetch_query::<u32>(posts(0), numbered(&calls, Duration::ZERO))
        .await
        .expect("fetch");
    let mut events = client.subscribe();

    client.dispose();
    client.dispose();

    assert!(client.is_disposed());
    assert_eq!(client.entry_count(), 0);
    assert_eq!(events.recv().await.expect("event").kind, EventKind::Disposed);
    assert!(events.try_recv().is_err());

    let rejected = client
        .fetch_query::<u32>(posts(0), numbered(&calls, Duration::ZERO))
        .await;
    assert!(matches!(rejected, Err(QueryError::Disposed)));
    client
        .prefetch_query(posts(1), numbered(&calls, Duration::ZERO))
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn dropping_the_last_observer_without_a_runtime_keeps_the_entry() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let client = QueryClient::new(config());
    let calls = Arc::new(AtomicU32::new(0));
    let query: Query<u32> = runtime.block_on(async {
        let query = client.watch(
            posts(0),
            numbered(&calls, Duration::ZERO),
            QueryOptions::default(),
        );
        query.settled().await;
        query
    });
    drop(runtime);

    drop(query);

    assert_eq!(client.entry_count(), 1);
    assert_eq!(client.get_query_data::<u32>(&posts(0)).as_deref(), Some(&1));
    client.dispose();
    assert_eq!(client.entry_count(), 0);
}
