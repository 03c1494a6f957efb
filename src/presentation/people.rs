//! People list view over the infinite catalog query.

use askama::Template;
use ipsum_api_types::{CatalogPage, Person};

use crate::cache::InfiniteState;

use super::views::{TemplateRenderError, render_template};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonRow {
    pub name: String,
    pub hair: String,
    pub eyes: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeopleScreen {
    pub loading: bool,
    pub error: Option<String>,
    pub rows: Vec<PersonRow>,
    pub has_more: bool,
}

impl PeopleScreen {
    pub fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or_default()
    }

    pub fn render(self) -> Result<String, TemplateRenderError> {
        render_template(PeopleTemplate { view: self })
    }
}

/// The indicator shows while any fetch runs; the list shows once pages exist
/// and the query is neither loading nor failed.
pub fn people_screen(state: &InfiniteState<CatalogPage<Person>>) -> PeopleScreen {
    let error = state
        .is_error()
        .then(|| state.error.as_ref().map(ToString::to_string).unwrap_or_default());
    let show_list = !state.pages.is_empty() && !state.is_loading() && !state.is_error();
    let rows = if show_list {
        state
            .pages
            .iter()
            .flat_map(|page| page.results.iter())
            .map(|person| PersonRow {
                name: person.name.clone(),
                hair: person.hair_color.clone(),
                eyes: person.eye_color.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };
    PeopleScreen {
        loading: state.is_loading() || state.is_fetching(),
        error,
        rows,
        has_more: state.has_next_page && !state.is_fetching(),
    }
}

#[derive(Template)]
#[template(path = "people.txt")]
pub struct PeopleTemplate {
    pub view: PeopleScreen,
}
