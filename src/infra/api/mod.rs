//! HTTP clients for the remote post service and the people catalog.
//!
//! No retries, timeouts or error translation happen here; callers see one
//! [`ApiError`] for any failed request.

mod client;
mod people;
mod posts;

pub use client::{ApiCtx, ApiError};
pub use people::CatalogApi;
pub use posts::PostsApi;
