//! Request and response shapes for the remote post service and the people
//! catalog. Fields the client does not use are accepted and ignored.

use serde::{Deserialize, Serialize};

/// Title written by every update request.
pub const UPDATED_TITLE: &str = "REACT QUERY FOREVER!!!!";

/// Number of posts requested per page.
pub const POSTS_PER_PAGE: u32 = 10;

/// A blog post owned by the remote post service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub body: String,
}

/// A comment attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: u64,
    pub post_id: u64,
    pub name: String,
    pub email: String,
    pub body: String,
}

/// Partial update body sent with `PATCH /posts/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTitleRequest {
    pub title: String,
}

impl Default for UpdateTitleRequest {
    fn default() -> Self {
        Self {
            title: UPDATED_TITLE.to_string(),
        }
    }
}

/// A character from the people catalog.
///
/// The catalog emits snake_case color fields; camelCase is accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    #[serde(rename = "hairColor", alias = "hair_color", default)]
    pub hair_color: String,
    #[serde(rename = "eyeColor", alias = "eye_color", default)]
    pub eye_color: String,
}

/// One page of a cursor-paginated catalog listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPage<T> {
    pub count: u64,
    /// Absolute URL of the following page; `None` ends the sequence.
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}
