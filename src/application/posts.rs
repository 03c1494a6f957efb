//! Posts view model: query keys, fetch page mapping, and post mutations.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use ipsum_api_types::{Comment, Post};
use serde_json::Value;

use crate::cache::{
    CacheFacade, Fetcher, Mutation, Query, QueryClient, QueryError, QueryKey, QueryOptions,
    fetcher,
};
use crate::infra::api::PostsApi;

/// Highest page index the browser navigates to.
pub const MAX_PAGE_INDEX: u32 = 10;

const POSTS_ROOT: &str = "posts";
const COMMENTS_ROOT: &str = "comments";

/// `["posts"]`, the family every page key belongs to.
pub fn posts_family() -> QueryKey {
    QueryKey::new(POSTS_ROOT)
}

/// `["posts", page_index]`
pub fn posts_key(page_index: u32) -> QueryKey {
    posts_family().with(page_index)
}

/// `["comments", post_id]`
pub fn comments_key(post_id: u64) -> QueryKey {
    QueryKey::new(COMMENTS_ROOT).with(post_id)
}

/// Remote page requested for `page_index`: one ahead of the index, capped at
/// [`MAX_PAGE_INDEX`].
pub fn page_to_fetch(page_index: u32) -> u32 {
    page_index.saturating_add(1).min(MAX_PAGE_INDEX)
}

/// Maps post browsing intents onto cached queries and mutations.
#[derive(Clone)]
pub struct PostsViewModel {
    client: QueryClient,
    facade: CacheFacade,
    api: PostsApi,
}

impl PostsViewModel {
    pub fn new(client: QueryClient, facade: CacheFacade, api: PostsApi) -> Self {
        Self {
            client,
            facade,
            api,
        }
    }

    /// Observe `["posts", page_index]`; previous data stays visible while a
    /// new page loads.
    pub fn list_posts(&self, page_index: u32) -> Query<Vec<Post>> {
        self.client.watch(
            posts_key(page_index),
            self.page_fetcher(page_to_fetch(page_index)),
            QueryOptions {
                keep_previous_data: true,
            },
        )
    }

    /// Point an existing list query at another page index.
    pub fn show_page(&self, query: &mut Query<Vec<Post>>, page_index: u32) {
        query.set_key(
            posts_key(page_index),
            self.page_fetcher(page_to_fetch(page_index)),
        );
    }

    /// Observe `["comments", post_id]`.
    pub fn list_comments(&self, post_id: u64) -> Query<Vec<Comment>> {
        self.client.watch(
            comments_key(post_id),
            self.comments_fetcher(post_id),
            QueryOptions::default(),
        )
    }

    /// Fetch the comments of `post_id` through the cache, joining any fetch
    /// already running for them.
    pub async fn fetch_comments(&self, post_id: u64) -> Result<Arc<Vec<Comment>>, QueryError> {
        self.client
            .fetch_query(comments_key(post_id), self.comments_fetcher(post_id))
            .await
    }

    /// Warm `["posts", current_page + 1]` with remote page `current_page + 1`.
    pub async fn prefetch_next_page(&self, current_page: u32) {
        let next_page = current_page.saturating_add(1);
        self.facade
            .prefetch(posts_key(next_page), self.page_fetcher(next_page))
            .await;
    }

    /// Delete a post by id; on success every `["posts", ..]` entry goes stale.
    pub fn delete_post(&self) -> Mutation<u64, Value> {
        let api = self.api.clone();
        Mutation::new(&self.client, move |post_id: u64| {
            let api = api.clone();
            async move { api.remove(post_id).await }
        })
        .on_success(invalidate_posts(self.facade.clone()))
    }

    /// Replace a post's title; on success every `["posts", ..]` entry goes stale.
    pub fn update_post(&self) -> Mutation<u64, Value> {
        let api = self.api.clone();
        Mutation::new(&self.client, move |post_id: u64| {
            let api = api.clone();
            async move { api.update(post_id).await }
        })
        .on_success(invalidate_posts(self.facade.clone()))
    }

    fn page_fetcher(&self, page: u32) -> Fetcher {
        let api = self.api.clone();
        fetcher(move || {
            let api = api.clone();
            async move { api.list_posts(page).await }
        })
    }

    fn comments_fetcher(&self, post_id: u64) -> Fetcher {
        let api = self.api.clone();
        fetcher(move || {
            let api = api.clone();
            async move { api.list_comments(post_id).await }
        })
    }
}

/// Success hook shared by the post mutations.
fn invalidate_posts(facade: CacheFacade) -> impl Fn(QueryClient) -> BoxFuture<'static, ()> + Send + Sync {
    move |_client| {
        let facade = facade.clone();
        async move { facade.invalidate_family(posts_family()).await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_index_maps_one_ahead_and_caps() {
        assert_eq!(page_to_fetch(0), 1);
        assert_eq!(page_to_fetch(1), 2);
        assert_eq!(page_to_fetch(9), 10);
        assert_eq!(page_to_fetch(10), 10);
        assert_eq!(page_to_fetch(u32::MAX), 10);
    }

    #[test]
    fn keys_follow_tuple_layout() {
        assert_eq!(posts_key(3).to_string(), "[\"posts\", 3]");
        assert_eq!(comments_key(7).to_string(), "[\"comments\", 7]");
        assert!(posts_key(3).starts_with(&posts_family()));
    }
}
