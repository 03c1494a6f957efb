//! Line-oriented terminal front end: command parsing plus the browsers that
//! turn commands into cache operations and cache state into text.

use std::convert::Infallible;
use std::str::FromStr;

use ipsum_api_types::{CatalogPage, Comment, Person, Post};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::application::context::AppContext;
use crate::application::devtools::Devtools;
use crate::application::people::PeopleViewModel;
use crate::application::posts::PostsViewModel;
use crate::cache::{InfiniteQuery, Mutation, MutationState, Query, QueryState};
use crate::config::Command;

use super::devtools::DevtoolsScreen;
use super::people::people_screen;
use super::post_detail::detail_screen;
use super::posts::PostsView;
use super::views::TemplateRenderError;

const HELP_TEXT: &str =
    "n next | p previous | s <id> select | d delete | u update | r refetch | m more | t devtools | q quit";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalCommand {
    NextPage,
    PreviousPage,
    Select(u64),
    Delete,
    Update,
    Refetch,
    LoadMore,
    ToggleDevtools,
    Quit,
    Unknown(String),
}

impl TerminalCommand {
    pub fn parse_line(line: &str) -> Self {
        let mut words = line.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("n"), None, None) => Self::NextPage,
            (Some("p"), None, None) => Self::PreviousPage,
            (Some("s"), Some(id), None) => match id.parse() {
                Ok(id) => Self::Select(id),
                Err(_) => Self::Unknown(line.trim().to_string()),
            },
            (Some("d"), None, None) => Self::Delete,
            (Some("u"), None, None) => Self::Update,
            (Some("r"), None, None) => Self::Refetch,
            (Some("m"), None, None) => Self::LoadMore,
            (Some("t"), None, None) => Self::ToggleDevtools,
            (Some("q"), None, None) => Self::Quit,
            _ => Self::Unknown(line.trim().to_string()),
        }
    }
}

impl FromStr for TerminalCommand {
    type Err = Infallible;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_line(line))
    }
}

/// Posts list plus the detail of the selected post.
pub struct PostsBrowser {
    model: PostsViewModel,
    view: PostsView,
    list: Query<Vec<Post>>,
    comments: Option<Query<Vec<Comment>>>,
    delete: Mutation<u64, Value>,
    update: Mutation<u64, Value>,
    prefetch: Option<JoinHandle<()>>,
}

impl PostsBrowser {
    /// Start observing page 0 and warm the page after it.
    pub fn mount(model: PostsViewModel) -> Self {
        let view = PostsView::default();
        let mut browser = Self {
            list: model.list_posts(view.current_page),
            delete: model.delete_post(),
            update: model.update_post(),
            model,
            view,
            comments: None,
            prefetch: None,
        };
        browser.schedule_prefetch();
        browser
    }

    pub fn view(&self) -> &PostsView {
        &self.view
    }

    pub fn list_state(&self) -> QueryState<Vec<Post>> {
        self.list.state()
    }

    pub fn comments_state(&self) -> Option<QueryState<Vec<Comment>>> {
        self.comments.as_ref().map(Query::state)
    }

    pub fn delete_state(&self) -> MutationState<Value> {
        self.delete.state()
    }

    pub fn update_state(&self) -> MutationState<Value> {
        self.update.state()
    }

    /// Apply a posts command. Returns `false` when the command does not
    /// concern the posts browser or is currently disabled.
    pub fn handle(&mut self, command: &TerminalCommand) -> bool {
        match command {
            TerminalCommand::NextPage => {
                if !self.view.next_page() {
                    return false;
                }
                self.page_changed();
                true
            }
            TerminalCommand::PreviousPage => {
                if !self.view.previous_page() {
                    return false;
                }
                self.page_changed();
                true
            }
            TerminalCommand::Select(post_id) => {
                let Some(listed) = self.list.state().data else {
                    return false;
                };
                if !self.view.select(&listed, *post_id) {
                    debug!(post_id, "Post is not on the current page");
                    return false;
                }
                self.comments = Some(self.model.list_comments(*post_id));
                true
            }
            TerminalCommand::Delete => self.with_selected(|browser, id| browser.delete.mutate(id)),
            TerminalCommand::Update => self.with_selected(|browser, id| browser.update.mutate(id)),
            TerminalCommand::Refetch => {
                self.list.start_refetch();
                true
            }
            _ => false,
        }
    }

    pub fn render(&self) -> Result<String, TemplateRenderError> {
        let mut out = self.view.screen(&self.list.state()).render()?;
        if let (Some(post), Some(comments)) = (self.view.selected.as_ref(), self.comments.as_ref()) {
            let detail = detail_screen(
                post,
                &comments.state(),
                &self.delete.state(),
                &self.update.state(),
            );
            out.push('\n');
            out.push_str(&detail.render()?);
        }
        Ok(out)
    }

    /// Wait for the running prefetch and for the observed queries to settle.
    pub async fn idle(&mut self) {
        if let Some(prefetch) = self.prefetch.take() {
            if let Err(err) = prefetch.await {
                warn!(
                    target = "ipsum::presentation::terminal",
                    error = %err,
                    "prefetch task ended abnormally"
                );
            }
        }
        self.list.settled().await;
        if let Some(comments) = self.comments.as_ref() {
            comments.settled().await;
        }
    }

    fn page_changed(&mut self) {
        self.model.show_page(&mut self.list, self.view.current_page);
        self.schedule_prefetch();
    }

    fn schedule_prefetch(&mut self) {
        if !self.view.should_prefetch() {
            return;
        }
        let model = self.model.clone();
        let current_page = self.view.current_page;
        self.prefetch = Some(tokio::spawn(async move {
            model.prefetch_next_page(current_page).await;
        }));
    }

    fn with_selected(&mut self, act: impl FnOnce(&mut Self, u64)) -> bool {
        let Some(post_id) = self.view.selected.as_ref().map(|post| post.id) else {
            return false;
        };
        act(self, post_id);
        true
    }
}

/// The infinite people list.
pub struct PeopleBrowser {
    query: InfiniteQuery<CatalogPage<Person>>,
    loading_more: Option<JoinHandle<()>>,
}

impl PeopleBrowser {
    pub fn mount(model: &PeopleViewModel) -> Self {
        Self {
            query: model.list(),
            loading_more: None,
        }
    }

    pub fn query(&self) -> &InfiniteQuery<CatalogPage<Person>> {
        &self.query
    }

    /// Append the next page in the background when one exists.
    pub fn load_more(&mut self) -> bool {
        if !self.query.has_next_page() {
            return false;
        }
        let query = self.query.clone();
        self.loading_more = Some(tokio::spawn(async move {
            if let Err(err) = query.fetch_next_page().await {
                warn!(
                    target = "ipsum::presentation::terminal",
                    error = %err,
                    "loading the next people page failed"
                );
            }
        }));
        true
    }

    pub fn render(&self) -> Result<String, TemplateRenderError> {
        people_screen(&self.query.state()).render()
    }

    /// Wait for a running "load more" and for the query to settle.
    pub async fn idle(&mut self) {
        if let Some(task) = self.loading_more.take() {
            let _ = task.await;
        }
        self.query.settled().await;
    }
}

/// Whether the input loop keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Everything mounted in one terminal session.
pub struct Shell {
    posts: Option<PostsBrowser>,
    people: Option<PeopleBrowser>,
    devtools: Devtools,
}

impl Shell {
    /// `browse` mounts the posts browser, plus the people list when enabled;
    /// `people` mounts the people list alone.
    pub fn mount(ctx: &AppContext, command: Command) -> Self {
        let (posts, people) = match command {
            Command::Browse => (
                Some(PostsBrowser::mount(ctx.posts())),
                ctx.show_people().then(|| PeopleBrowser::mount(&ctx.people())),
            ),
            Command::People => (None, Some(PeopleBrowser::mount(&ctx.people()))),
        };
        Self {
            posts,
            people,
            devtools: ctx.devtools().clone(),
        }
    }

    pub fn posts(&self) -> Option<&PostsBrowser> {
        self.posts.as_ref()
    }

    pub fn people(&self) -> Option<&PeopleBrowser> {
        self.people.as_ref()
    }

    pub fn handle(&mut self, command: TerminalCommand) -> Flow {
        let handled = match &command {
            TerminalCommand::Quit => return Flow::Quit,
            TerminalCommand::ToggleDevtools => {
                self.devtools.toggle();
                true
            }
            TerminalCommand::LoadMore => self
                .people
                .as_mut()
                .is_some_and(PeopleBrowser::load_more),
            TerminalCommand::Unknown(_) => false,
            other => self
                .posts
                .as_mut()
                .is_some_and(|posts| posts.handle(other)),
        };
        if !handled {
            debug!(?command, "Command ignored");
        }
        Flow::Continue
    }

    pub fn render(&self) -> Result<String, TemplateRenderError> {
        let mut sections = Vec::new();
        if let Some(posts) = self.posts.as_ref() {
            sections.push(posts.render()?);
        }
        if let Some(people) = self.people.as_ref() {
            sections.push(people.render()?);
        }
        if self.devtools.is_open() {
            sections.push(DevtoolsScreen::new(&self.devtools.entries()).render()?);
        }
        sections.push(HELP_TEXT.to_string());
        Ok(sections.join("\n"))
    }

    /// Wait for background work started by earlier commands.
    pub async fn idle(&mut self) {
        if let Some(posts) = self.posts.as_mut() {
            posts.idle().await;
        }
        if let Some(people) = self.people.as_mut() {
            people.idle().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> TerminalCommand {
        line.parse().expect("infallible")
    }

    #[test]
    fn parses_known_commands() {
        assert_eq!(parse("n"), TerminalCommand::NextPage);
        assert_eq!(parse(" p "), TerminalCommand::PreviousPage);
        assert_eq!(parse("s 3"), TerminalCommand::Select(3));
        assert_eq!(parse("d"), TerminalCommand::Delete);
        assert_eq!(parse("u"), TerminalCommand::Update);
        assert_eq!(parse("r"), TerminalCommand::Refetch);
        assert_eq!(parse("m"), TerminalCommand::LoadMore);
        assert_eq!(parse("t"), TerminalCommand::ToggleDevtools);
        assert_eq!(parse("q"), TerminalCommand::Quit);
    }

    #[test]
    fn malformed_lines_are_unknown() {
        assert_eq!(parse("s"), TerminalCommand::Unknown("s".to_string()));
        assert_eq!(parse("s x"), TerminalCommand::Unknown("s x".to_string()));
        assert_eq!(parse("n 2"), TerminalCommand::Unknown("n 2".to_string()));
        assert_eq!(parse(""), TerminalCommand::Unknown(String::new()));
    }
}
