//! Debug overlay: one row per cache entry.

use askama::Template;
use time::format_description::well_known::Rfc3339;

use crate::cache::EntrySnapshot;

use super::views::{TemplateRenderError, render_template};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevtoolsRow {
    pub key: String,
    pub status: &'static str,
    pub fetch_status: &'static str,
    pub freshness: &'static str,
    pub observers: usize,
    pub failures: u32,
    pub updated_at: String,
}

impl From<&EntrySnapshot> for DevtoolsRow {
    fn from(entry: &EntrySnapshot) -> Self {
        Self {
            key: entry.key.to_string(),
            status: entry.status.as_str(),
            fetch_status: entry.fetch_status.as_str(),
            freshness: if entry.stale { "stale" } else { "fresh" },
            observers: entry.observers,
            failures: entry.failure_count,
            updated_at: entry
                .updated_at
                .and_then(|at| at.format(&Rfc3339).ok())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevtoolsScreen {
    pub rows: Vec<DevtoolsRow>,
}

impl DevtoolsScreen {
    pub fn new(entries: &[EntrySnapshot]) -> Self {
        Self {
            rows: entries.iter().map(DevtoolsRow::from).collect(),
        }
    }

    pub fn render(self) -> Result<String, TemplateRenderError> {
        render_template(DevtoolsTemplate { view: self })
    }
}

#[derive(Template)]
#[template(path = "devtools.txt")]
pub struct DevtoolsTemplate {
    pub view: DevtoolsScreen,
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::cache::{FetchStatus, QueryKey, Status};

    fn entry(key: QueryKey, stale: bool) -> EntrySnapshot {
        EntrySnapshot {
            key,
            status: Status::Success,
            fetch_status: FetchStatus::Idle,
            stale,
            observers: 1,
            failure_count: 0,
            updated_at: Some(datetime!(2024-05-01 12:00:00 UTC)),
        }
    }

    #[test]
    fn rows_describe_each_entry() {
        let screen = DevtoolsScreen::new(&[
            entry(QueryKey::new("posts").with(0u32), true),
            entry(QueryKey::new("comments").with(3u64), false),
        ]);
        assert_eq!(screen.rows[0].key, r#"["posts", 0]"#);
        assert_eq!(screen.rows[0].freshness, "stale");
        assert_eq!(screen.rows[1].freshness, "fresh");
        assert_eq!(screen.rows[1].updated_at, "2024-05-01T12:00:00Z");
    }

    #[test]
    fn never_updated_entries_show_dash() {
        let mut pending = entry(QueryKey::new("sw-people"), true);
        pending.status = Status::Loading;
        pending.fetch_status = FetchStatus::Fetching;
        pending.updated_at = None;

        let text = DevtoolsScreen::new(&[pending]).render().expect("render");
        assert!(text.contains(r#"["sw-people"]"#));
        assert!(text.contains("loading"));
        assert!(text.contains("fetching"));
        assert!(text.contains(" -"));
    }

    #[test]
    fn empty_cache_renders_placeholder() {
        let text = DevtoolsScreen::new(&[]).render().expect("render");
        assert!(text.contains("no cached queries"));
    }
}
