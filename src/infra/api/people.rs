use ipsum_api_types::{CatalogPage, Person};
use reqwest::{Method, Url};

use super::client::{ApiCtx, ApiError};

/// Client for the cursor-paginated people catalog.
#[derive(Clone, Debug)]
pub struct CatalogApi {
    ctx: ApiCtx,
    first_page: Url,
}

impl CatalogApi {
    /// `first_page_url` addresses the first catalog page.
    pub fn new(first_page_url: &str) -> Result<Self, ApiError> {
        Ok(Self {
            ctx: ApiCtx::new(first_page_url)?,
            first_page: Url::parse(first_page_url)?,
        })
    }

    pub fn first_page_url(&self) -> String {
        self.first_page.to_string()
    }

    /// `GET {cursor_url}`; the cursor is the catalog's own `next` link.
    pub async fn list_people(&self, cursor_url: &str) -> Result<CatalogPage<Person>, ApiError> {
        self.ctx.request_url(Method::GET, cursor_url).await
    }
}
