//! Ipsum query cache
//!
//! An in-process asynchronous cache of remote query results:
//!
//! - **Keyed entries** with freshness tracking (`stale_time`) and eviction of
//!   unobserved entries (`gc_time`)
//! - **Coalescing**: at most one fetch per key; concurrent requesters share it
//! - **Observers** ([`Query`], [`InfiniteQuery`]) that refetch stale data
//! - **Mutations** with success hooks, typically used to invalidate queries
//! - **Events** broadcast on every state change
//!
//! ## Configuration
//!
//! [`CacheConfig`] is built from [`CacheSettings`](crate::config::CacheSettings),
//! which the settings loader reads from:
//!
//! ```toml
//! [cache]
//! stale_time_ms = 0
//! gc_time_ms = 300000
//! retry = 3
//! retry_delay_ms = 1000
//! ```

mod client;
mod config;
mod error;
mod events;
mod facade;
mod infinite;
mod inflight;
mod keys;
mod lock;
mod mutation;
mod query;
mod store;

pub use client::{AnyValue, FetchFuture, Fetcher, QueryClient, fetcher};
pub use config::CacheConfig;
pub use error::QueryError;
pub use events::{CacheEvent, Epoch, EventKind};
pub use facade::CacheFacade;
pub use infinite::{InfiniteData, InfiniteQuery, InfiniteState};
pub use keys::{KeySegment, QueryFilter, QueryKey};
pub use mutation::{Mutation, MutationState};
pub use query::{Query, QueryOptions, QueryState};
pub use store::{EntrySnapshot, FetchStatus, Status};
