//! Post detail view. Title and body stay hidden until the post's comments
//! have loaded.

use askama::Template;
use ipsum_api_types::{Comment, Post};
use serde_json::Value;

use crate::cache::{MutationState, QueryState, Status};

use super::views::{ERROR_TEXT, LOADING_TEXT, TemplateRenderError, render_template};

/// Inline status line of the delete mutation.
pub fn delete_status(state: &MutationState<Value>) -> Option<&'static str> {
    match state.status {
        Status::Idle => None,
        Status::Loading => Some("Deleting the post"),
        Status::Error => Some("Error deleting the post"),
        Status::Success => Some("Post has (not) been deleted"),
    }
}

/// Inline status line of the update mutation.
pub fn update_status(state: &MutationState<Value>) -> Option<&'static str> {
    match state.status {
        Status::Idle => None,
        Status::Loading => Some("Updating the post"),
        Status::Error => Some("Error updating the post"),
        Status::Success => Some("Post has (not) been updated"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRow {
    pub email: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailScreen {
    /// Loading or error text shown instead of the post.
    pub notice: Option<&'static str>,
    pub title: String,
    pub body: String,
    pub delete_status: Option<&'static str>,
    pub update_status: Option<&'static str>,
    pub comments: Vec<CommentRow>,
}

impl DetailScreen {
    pub fn is_ready(&self) -> bool {
        self.notice.is_none()
    }

    pub fn notice_text(&self) -> &str {
        self.notice.unwrap_or_default()
    }

    pub fn delete_text(&self) -> &str {
        self.delete_status.unwrap_or_default()
    }

    pub fn update_text(&self) -> &str {
        self.update_status.unwrap_or_default()
    }

    pub fn render(self) -> Result<String, TemplateRenderError> {
        render_template(PostDetailTemplate { view: self })
    }
}

/// Build the detail screen for `post` from its comments query and the two
/// mutations. The displayed post never changes with mutation results.
pub fn detail_screen(
    post: &Post,
    comments: &QueryState<Vec<Comment>>,
    delete: &MutationState<Value>,
    update: &MutationState<Value>,
) -> DetailScreen {
    let loaded = match (comments.status, &comments.data) {
        (Status::Success, Some(loaded)) => Some(loaded),
        _ => None,
    };
    let Some(loaded) = loaded else {
        let notice = if comments.status == Status::Error {
            ERROR_TEXT
        } else {
            LOADING_TEXT
        };
        return DetailScreen {
            notice: Some(notice),
            title: String::new(),
            body: String::new(),
            delete_status: None,
            update_status: None,
            comments: Vec::new(),
        };
    };

    DetailScreen {
        notice: None,
        title: post.title.clone(),
        body: post.body.clone(),
        delete_status: delete_status(delete),
        update_status: update_status(update),
        comments: loaded
            .iter()
            .map(|comment| CommentRow {
                email: comment.email.clone(),
                body: comment.body.clone(),
            })
            .collect(),
    }
}

#[derive(Template)]
#[template(path = "post_detail.txt")]
pub struct PostDetailTemplate {
    pub view: DetailScreen,
}
