use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

use super::keys::QueryKey;

/// Error stored in a cache entry or mutation state.
///
/// Cloned into every observer, so the underlying fetch error is shared.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    #[error("{0}")]
    Fetch(Arc<dyn StdError + Send + Sync>),
    #[error("query client has been disposed")]
    Disposed,
    #[error("cached value for {key} has a different type")]
    TypeMismatch { key: QueryKey },
    #[error("fetch aborted: {0}")]
    Aborted(String),
}

impl QueryError {
    pub fn fetch<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Fetch(Arc::new(error))
    }
}
