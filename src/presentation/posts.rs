//! Posts list view: page navigation, selection, and the list screen.

use std::fmt;

use askama::Template;
use ipsum_api_types::Post;

use crate::application::posts::MAX_PAGE_INDEX;
use crate::cache::{QueryState, Status};

use super::views::{ERROR_TEXT, LOADING_TEXT, TemplateRenderError, render_template};

/// Ephemeral browser state. The current page starts at 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostsView {
    pub current_page: u32,
    /// The post picked from the list, as it was listed.
    pub selected: Option<Post>,
}

impl PostsView {
    pub fn previous_enabled(&self) -> bool {
        self.current_page > 1
    }

    pub fn next_enabled(&self) -> bool {
        self.current_page < MAX_PAGE_INDEX
    }

    /// The next page is prefetched whenever one exists.
    pub fn should_prefetch(&self) -> bool {
        self.current_page < MAX_PAGE_INDEX
    }

    /// Advance one page; ignored while "Next page" is disabled.
    pub fn next_page(&mut self) -> bool {
        if !self.next_enabled() {
            return false;
        }
        self.current_page += 1;
        true
    }

    /// Go back one page; ignored while "Previous page" is disabled.
    pub fn previous_page(&mut self) -> bool {
        if !self.previous_enabled() {
            return false;
        }
        self.current_page -= 1;
        true
    }

    /// Select the listed post with `post_id`. Unknown ids are ignored.
    pub fn select(&mut self, listed: &[Post], post_id: u64) -> bool {
        match listed.iter().find(|post| post.id == post_id) {
            Some(post) => {
                self.selected = Some(post.clone());
                true
            }
            None => false,
        }
    }

    pub fn screen(&self, list: &QueryState<Vec<Post>>) -> PostsScreen {
        let notice = match list.status {
            Status::Success => None,
            Status::Error => Some(ERROR_TEXT),
            Status::Idle | Status::Loading => Some(LOADING_TEXT),
        };
        let selected_id = self.selected.as_ref().map(|post| post.id);
        let rows = match (&list.data, notice) {
            (Some(posts), None) => posts
                .iter()
                .map(|post| PostRow {
                    marker: if Some(post.id) == selected_id { ">" } else { " " },
                    id: post.id,
                    title: post.title.clone(),
                })
                .collect(),
            _ => Vec::new(),
        };
        PostsScreen {
            page: self.current_page,
            notice,
            rows,
            previous: Control {
                key: "p",
                label: "Previous page",
                enabled: self.previous_enabled(),
            },
            next: Control {
                key: "n",
                label: "Next page",
                enabled: self.next_enabled(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRow {
    pub marker: &'static str,
    pub id: u64,
    pub title: String,
}

/// A command-bound button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    pub key: &'static str,
    pub label: &'static str,
    pub enabled: bool,
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.enabled {
            write!(f, "[{}] {}", self.key, self.label)
        } else {
            write!(f, "[-] {} (disabled)", self.label)
        }
    }
}

/// Everything the posts list shows for one state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostsScreen {
    pub page: u32,
    /// Loading or error text shown instead of the list.
    pub notice: Option<&'static str>,
    pub rows: Vec<PostRow>,
    pub previous: Control,
    pub next: Control,
}

impl PostsScreen {
    pub fn is_ready(&self) -> bool {
        self.notice.is_none()
    }

    pub fn notice_text(&self) -> &str {
        self.notice.unwrap_or_default()
    }

    pub fn render(self) -> Result<String, TemplateRenderError> {
        render_template(PostsTemplate { view: self })
    }
}

#[derive(Template)]
#[template(path = "posts.txt")]
pub struct PostsTemplate {
    pub view: PostsScreen,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::FetchStatus;

    fn posts(ids: std::ops::RangeInclusive<u64>) -> Vec<Post> {
        ids.map(|id| Post {
            id,
            title: format!("title {id}"),
            body: format!("body {id}"),
        })
        .collect()
    }

    fn state(status: Status, data: Option<Vec<Post>>) -> QueryState<Vec<Post>> {
        QueryState {
            status,
            fetch_status: FetchStatus::Idle,
            data: data.map(Arc::new),
            error: None,
            is_previous_data: false,
            is_stale: false,
            updated_at: None,
        }
    }

    #[test]
    fn controls_follow_page_bounds() {
        for page in 0..=MAX_PAGE_INDEX {
            let view = PostsView {
                current_page: page,
                selected: None,
            };
            assert_eq!(view.previous_enabled(), page > 1, "page {page}");
            assert_eq!(view.next_enabled(), page < MAX_PAGE_INDEX, "page {page}");
        }
    }

    #[test]
    fn disabled_controls_ignore_commands() {
        let mut view = PostsView::default();
        assert!(!view.previous_page());
        assert_eq!(view.current_page, 0);

        view.current_page = MAX_PAGE_INDEX;
        assert!(!view.next_page());
        assert_eq!(view.current_page, MAX_PAGE_INDEX);
    }

    #[test]
    fn first_page_lists_ten_posts() {
        let view = PostsView::default();
        let screen = view.screen(&state(Status::Success, Some(posts(1..=10))));

        assert!(screen.is_ready());
        assert_eq!(screen.rows.len(), 10);
        assert!(screen.next.enabled);
        assert!(!screen.previous.enabled);
    }

    #[test]
    fn loading_and_error_replace_the_list() {
        let view = PostsView::default();
        let loading = view.screen(&state(Status::Loading, None));
        assert_eq!(loading.notice, Some(LOADING_TEXT));
        assert!(loading.rows.is_empty());

        let failed = view.screen(&state(Status::Error, Some(posts(1..=3))));
        assert_eq!(failed.notice, Some(ERROR_TEXT));
        assert!(failed.rows.is_empty());
    }

    #[test]
    fn selection_marks_the_row() {
        let listed = posts(1..=5);
        let mut view = PostsView::default();
        assert!(view.select(&listed, 3));
        assert!(!view.select(&listed, 42));

        let screen = view.screen(&state(Status::Success, Some(listed)));
        let marked: Vec<u64> = screen
            .rows
            .iter()
            .filter(|row| row.marker == ">")
            .map(|row| row.id)
            .collect();
        assert_eq!(marked, vec![3]);
    }

    #[test]
    fn render_shows_titles_and_disabled_control() {
        let view = PostsView::default();
        let text = view
            .screen(&state(Status::Success, Some(posts(1..=2))))
            .render()
            .expect("render");

        assert!(text.contains("title 1"));
        assert!(text.contains("title 2"));
        assert!(text.contains("Previous page (disabled)"));
        assert!(text.contains("[n] Next page"));
        assert!(text.contains("Page 0"));
    }

    #[test]
    fn render_shows_notice_only() {
        let text = PostsView::default()
            .screen(&state(Status::Loading, None))
            .render()
            .expect("render");
        assert!(text.contains(LOADING_TEXT));
        assert!(!text.contains("Next page"));
    }
}
