//! Infinite queries: a growing list of cursor-addressed pages under one key.

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use super::client::{AnyValue, Fetcher, QueryClient, downcast};
use super::error::QueryError;
use super::keys::QueryKey;
use super::query::ObserverGuard;
use super::store::{FetchStatus, Status};

type PageFetcher<P> = Arc<dyn Fn(String) -> BoxFuture<'static, Result<Arc<P>, QueryError>> + Send + Sync>;
type NextParam<P> = Arc<dyn Fn(&P) -> Option<String> + Send + Sync>;

/// Pages fetched so far, with the parameter each page was fetched with.
#[derive(Debug)]
pub struct InfiniteData<P> {
    pub pages: Vec<Arc<P>>,
    pub page_params: Vec<String>,
}

impl<P> Clone for InfiniteData<P> {
    fn clone(&self) -> Self {
        Self {
            pages: self.pages.clone(),
            page_params: self.page_params.clone(),
        }
    }
}

impl<P> Default for InfiniteData<P> {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            page_params: Vec::new(),
        }
    }
}

/// Snapshot of an infinite query.
#[derive(Debug)]
pub struct InfiniteState<P> {
    pub status: Status,
    pub fetch_status: FetchStatus,
    pub pages: Vec<Arc<P>>,
    pub has_next_page: bool,
    pub error: Option<QueryError>,
}

impl<P> InfiniteState<P> {
    pub fn is_loading(&self) -> bool {
        self.status == Status::Loading
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch_status == FetchStatus::Fetching
    }
}

/// A live infinite query. Clones share one observer registration.
pub struct InfiniteQuery<P> {
    client: QueryClient,
    key: QueryKey,
    fetch_page: PageFetcher<P>,
    next_param: NextParam<P>,
    refetch_all: Fetcher,
    observer: Arc<ObserverGuard>,
}

impl<P> Clone for InfiniteQuery<P> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            key: self.key.clone(),
            fetch_page: Arc::clone(&self.fetch_page),
            next_param: Arc::clone(&self.next_param),
            refetch_all: Arc::clone(&self.refetch_all),
            observer: Arc::clone(&self.observer),
        }
    }
}

impl QueryClient {
    /// Observe an infinite query whose first page is fetched with
    /// `initial_param`; `next_param` extracts the following page's parameter.
    pub fn watch_infinite<P, E, F, Fut, N>(
        &self,
        key: QueryKey,
        initial_param: impl Into<String>,
        fetch_page: F,
        next_param: N,
    ) -> InfiniteQuery<P>
    where
        P: Send + Sync + 'static,
        E: StdError + Send + Sync + 'static,
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<P, E>> + Send + 'static,
        N: Fn(&P) -> Option<String> + Send + Sync + 'static,
    {
        let fetch_page: PageFetcher<P> = Arc::new(move |param| {
            let pending = fetch_page(param);
            async move { pending.await.map(Arc::new).map_err(QueryError::fetch) }.boxed()
        });
        let next_param: NextParam<P> = Arc::new(next_param);
        let refetch_all = refetcher(
            self,
            key.clone(),
            initial_param.into(),
            Arc::clone(&fetch_page),
            Arc::clone(&next_param),
        );
        let observer = Arc::new(ObserverGuard::observe(self, &key, &refetch_all));
        InfiniteQuery {
            client: self.clone(),
            key,
            fetch_page,
            next_param,
            refetch_all,
            observer,
        }
    }
}

/// Reload as many pages as are cached, walking the cursor from the start.
fn refetcher<P>(
    client: &QueryClient,
    key: QueryKey,
    initial_param: String,
    fetch_page: PageFetcher<P>,
    next_param: NextParam<P>,
) -> Fetcher
where
    P: Send + Sync + 'static,
{
    // Weak: the fetcher is stored inside the client's own entry.
    let weak = client.downgrade();
    Arc::new(move || {
        let loaded = QueryClient::upgrade(&weak)
            .and_then(|client| client.get_query_data::<InfiniteData<P>>(&key))
            .map_or(0, |data| data.pages.len())
            .max(1);
        let fetch_page = Arc::clone(&fetch_page);
        let next_param = Arc::clone(&next_param);
        let mut param = Some(initial_param.clone());
        async move {
            let mut data = InfiniteData::<P>::default();
            while let Some(current) = param.take() {
                if data.pages.len() >= loaded {
                    break;
                }
                let page = fetch_page(current.clone()).await?;
                param = next_param(page.as_ref());
                data.pages.push(page);
                data.page_params.push(current);
            }
            Ok(Arc::new(data) as AnyValue)
        }
        .boxed()
    })
}

impl<P> InfiniteQuery<P>
where
    P: Send + Sync + 'static,
{
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn state(&self) -> InfiniteState<P> {
        let entry = self.client.inspect(&self.key, |entry| {
            (
                entry.status,
                entry.fetch_status,
                entry.data.clone(),
                entry.error.clone(),
            )
        });
        let Some((status, fetch_status, data, error)) = entry else {
            let error = self.client.is_disposed().then_some(QueryError::Disposed);
            return InfiniteState {
                status: if error.is_some() { Status::Error } else { Status::Idle },
                fetch_status: FetchStatus::Idle,
                pages: Vec::new(),
                has_next_page: false,
                error,
            };
        };
        let data = data.and_then(|value| value.downcast::<InfiniteData<P>>().ok());
        let pages = data.map(|data| data.pages.clone()).unwrap_or_default();
        let has_next_page = pages
            .last()
            .is_some_and(|page| (self.next_param)(page.as_ref()).is_some());
        InfiniteState {
            status,
            fetch_status,
            pages,
            has_next_page,
            error,
        }
    }

    pub fn has_next_page(&self) -> bool {
        self.data()
            .and_then(|data| data.pages.last().cloned())
            .is_some_and(|page| (self.next_param)(page.as_ref()).is_some())
    }

    /// Append the page addressed by the last page's cursor. Does nothing when
    /// there is no next page.
    pub async fn fetch_next_page(&self) -> Result<(), QueryError> {
        self.client.ensure_live()?;
        if let Some(running) = self.client.in_flight(&self.key) {
            running.await?;
        }
        let Some(data) = self.data() else {
            self.refetch().await?;
            return Ok(());
        };
        let Some(param) = data.pages.last().and_then(|page| (self.next_param)(page.as_ref())) else {
            debug!(key = %self.key, "No next page to fetch");
            return Ok(());
        };

        let fetch_page = Arc::clone(&self.fetch_page);
        let append: Fetcher = Arc::new(move || {
            let base = Arc::clone(&data);
            let fetch_page = Arc::clone(&fetch_page);
            let param = param.clone();
            async move {
                let page = fetch_page(param.clone()).await?;
                let mut next = InfiniteData::clone(&base);
                next.pages.push(page);
                next.page_params.push(param);
                Ok(Arc::new(next) as AnyValue)
            }
            .boxed()
        });
        self.client.start_fetch(&self.key, append).await?;
        Ok(())
    }

    /// Reload every cached page from the first cursor.
    pub async fn refetch(&self) -> Result<Arc<InfiniteData<P>>, QueryError> {
        self.client.ensure_live()?;
        let value = self
            .client
            .start_fetch(self.observer.key(), Arc::clone(&self.refetch_all))
            .await?;
        downcast(&self.key, value)
    }

    /// Wait until no fetch is running for the key, then return its state.
    pub async fn settled(&self) -> InfiniteState<P> {
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

    fn data(&self) -> Option<Arc<InfiniteData<P>>> {
        self.client.get_query_data::<InfiniteData<P>>(&self.key)
    }
}
