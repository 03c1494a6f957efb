use ipsum_api_types::{Comment, POSTS_PER_PAGE, Post, UpdateTitleRequest};
use reqwest::Method;
use serde_json::Value;
use tracing::info;

use super::client::{ApiCtx, ApiError};

/// Client for the remote post service.
#[derive(Clone, Debug)]
pub struct PostsApi {
    ctx: ApiCtx,
}

impl PostsApi {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(Self {
            ctx: ApiCtx::new(base_url)?,
        })
    }

    /// `GET /posts?_limit=10&_page={page}`
    pub async fn list_posts(&self, page: u32) -> Result<Vec<Post>, ApiError> {
        let query = [
            ("_limit", POSTS_PER_PAGE.to_string()),
            ("_page", page.to_string()),
        ];
        self.ctx
            .request::<_, ()>(Method::GET, "posts", Some(&query[..]), None)
            .await
    }

    /// `GET /comments?postId={post_id}`
    pub async fn list_comments(&self, post_id: u64) -> Result<Vec<Comment>, ApiError> {
        let query = [("postId", post_id.to_string())];
        self.ctx
            .request::<_, ()>(Method::GET, "comments", Some(&query[..]), None)
            .await
    }

    /// `PATCH /posts/{post_id}` with the fixed replacement title.
    pub async fn update(&self, post_id: u64) -> Result<Value, ApiError> {
        info!(post_id, "Updating post title");
        self.ctx
            .request(
                Method::PATCH,
                &format!("posts/{post_id}"),
                None,
                Some(&UpdateTitleRequest::default()),
            )
            .await
    }

    /// `DELETE /posts/{post_id}`
    pub async fn remove(&self, post_id: u64) -> Result<Value, ApiError> {
        info!(post_id, "Deleting post");
        self.ctx
            .request::<_, ()>(Method::DELETE, &format!("posts/{post_id}"), None, None)
            .await
    }
}
