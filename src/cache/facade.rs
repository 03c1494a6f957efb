//! Narrow cache surface handed to view models.

use super::client::{Fetcher, QueryClient};
use super::keys::{QueryFilter, QueryKey};

/// Prefetch and invalidation without the rest of the client API.
#[derive(Clone)]
pub struct CacheFacade {
    client: QueryClient,
}

impl CacheFacade {
    pub fn new(client: QueryClient) -> Self {
        Self { client }
    }

    /// Fetch `key` unless it is fresh or already fetching. Never fails.
    pub async fn prefetch(&self, key: QueryKey, fetcher: Fetcher) {
        self.client.prefetch_query(key, fetcher).await;
    }

    /// Mark the entry stored under exactly `key` stale.
    pub async fn invalidate(&self, key: QueryKey) {
        self.client
            .invalidate_queries(&QueryFilter::exact(key))
            .await;
    }

    /// Mark every entry whose key starts with `key` stale.
    pub async fn invalidate_family(&self, key: QueryKey) {
        self.client
            .invalidate_queries(&QueryFilter::family(key))
            .await;
    }
}
