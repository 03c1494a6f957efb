//! Mutations: one-shot remote writes with a success hook.
//!
//! Mutations never retry. The success hook runs before the mutation reports
//! success, so dependent queries are already invalidated when views see it.

use std::error::Error as StdError;
use std::future::Future;
use std::sync::{Arc, RwLock};

use futures::FutureExt;
use futures::future::BoxFuture;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::client::QueryClient;
use super::error::QueryError;
use super::events::EventKind;
use super::lock::{rw_read, rw_write};
use super::store::Status;

const SOURCE: &str = "cache::mutation";

type MutateFn<V, T> = Arc<dyn Fn(V) -> BoxFuture<'static, Result<T, QueryError>> + Send + Sync>;
type SuccessHook = Arc<dyn Fn(QueryClient) -> BoxFuture<'static, ()> + Send + Sync>;

/// State of the most recent `mutate` call.
#[derive(Debug)]
pub struct MutationState<T> {
    pub status: Status,
    pub data: Option<Arc<T>>,
    pub error: Option<QueryError>,
    pub submitted_at: Option<OffsetDateTime>,
}

impl<T> Default for MutationState<T> {
    fn default() -> Self {
        Self {
            status: Status::Idle,
            data: None,
            error: None,
            submitted_at: None,
        }
    }
}

impl<T> Clone for MutationState<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            submitted_at: self.submitted_at,
        }
    }
}

impl<T> MutationState<T> {
    pub fn is_idle(&self) -> bool {
        self.status == Status::Idle
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
}

/// A remote write bound to a query client.
pub struct Mutation<V, T> {
    id: u64,
    client: QueryClient,
    mutate_fn: MutateFn<V, T>,
    on_success: Option<SuccessHook>,
    state: Arc<RwLock<MutationState<T>>>,
}

impl<V, T> Clone for Mutation<V, T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            client: self.client.clone(),
            mutate_fn: Arc::clone(&self.mutate_fn),
            on_success: self.on_success.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<V, T> Mutation<V, T>
where
    V: Send + 'static,
    T: Send + Sync + 'static,
{
    pub fn new<F, Fut, E>(client: &QueryClient, mutate: F) -> Self
    where
        F: Fn(V) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: StdError + Send + Sync + 'static,
    {
        let mutate_fn: MutateFn<V, T> = Arc::new(move |variables| {
            let pending = mutate(variables);
            async move { pending.await.map_err(QueryError::fetch) }.boxed()
        });
        Self {
            id: client.next_mutation_id(),
            client: client.clone(),
            mutate_fn,
            on_success: None,
            state: Arc::new(RwLock::new(MutationState::default())),
        }
    }

    /// Run `hook` after every successful mutation, before success is reported.
    #[must_use]
    pub fn on_success<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(QueryClient) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_success = Some(Arc::new(move |client| hook(client).boxed()));
        self
    }

    pub fn state(&self) -> MutationState<T> {
        rw_read(&self.state, SOURCE, "state").clone()
    }

    /// Run the mutation and wait for it, success hook included.
    pub async fn mutate_async(&self, variables: V) -> Result<Arc<T>, QueryError> {
        if let Err(error) = self.client.ensure_live() {
            self.fail(&error);
            return Err(error);
        }
        self.set_state(MutationState {
            status: Status::Loading,
            submitted_at: Some(OffsetDateTime::now_utc()),
            ..MutationState::default()
        });
        info!(mutation_id = self.id, "Mutation started");

        match (self.mutate_fn)(variables).await {
            Ok(value) => {
                let value = Arc::new(value);
                if let Some(hook) = &self.on_success {
                    hook(self.client.clone()).await;
                }
                let submitted_at = self.state().submitted_at;
                self.set_state(MutationState {
                    status: Status::Success,
                    data: Some(Arc::clone(&value)),
                    error: None,
                    submitted_at,
                });
                info!(mutation_id = self.id, "Mutation succeeded");
                Ok(value)
            }
            Err(error) => {
                warn!(mutation_id = self.id, error = %error, "Mutation failed");
                self.fail(&error);
                Err(error)
            }
        }
    }

    /// Fire the mutation in the background; observe it through `state`.
    pub fn mutate(&self, variables: V) {
        let mutation = self.clone();
        tokio::spawn(async move {
            let _ = mutation.mutate_async(variables).await;
        });
    }

    /// Return to idle, forgetting the last outcome.
    pub fn reset(&self) {
        self.set_state(MutationState::default());
    }

    fn fail(&self, error: &QueryError) {
        let submitted_at = self.state().submitted_at;
        self.set_state(MutationState {
            status: Status::Error,
            data: None,
            error: Some(error.clone()),
            submitted_at,
        });
    }

    fn set_state(&self, next: MutationState<T>) {
        *rw_write(&self.state, SOURCE, "set_state") = next;
        self.client.publish(EventKind::MutationUpdated {
            mutation_id: self.id,
        });
    }
}
