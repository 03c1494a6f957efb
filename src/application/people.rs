//! People view model: one infinite query over the catalog's cursor pages.

use ipsum_api_types::{CatalogPage, Person};

use crate::cache::{InfiniteQuery, QueryClient, QueryKey};
use crate::infra::api::CatalogApi;

/// `["sw-people"]`
pub fn people_key() -> QueryKey {
    QueryKey::new("sw-people")
}

#[derive(Clone)]
pub struct PeopleViewModel {
    client: QueryClient,
    api: CatalogApi,
}

impl PeopleViewModel {
    pub fn new(client: QueryClient, api: CatalogApi) -> Self {
        Self { client, api }
    }

    /// Observe the people list, starting at the catalog's first page and
    /// following each page's `next` cursor.
    pub fn list(&self) -> InfiniteQuery<CatalogPage<Person>> {
        let api = self.api.clone();
        self.client.watch_infinite(
            people_key(),
            self.api.first_page_url(),
            move |cursor: String| {
                let api = api.clone();
                async move { api.list_people(&cursor).await }
            },
            |page: &CatalogPage<Person>| page.next.clone(),
        )
    }
}
