//! Query key definitions.
//!
//! A `QueryKey` is an ordered tuple of segments such as `["posts", 3]`. Keys
//! drive lookup, request coalescing, and invalidation.

use std::fmt;

/// One element of a query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeySegment {
    Int(i64),
    Str(String),
}

impl From<&str> for KeySegment {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for KeySegment {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for KeySegment {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for KeySegment {
    fn from(value: u64) -> Self {
        // Ids above i64::MAX keep their digits as a string segment.
        i64::try_from(value).map_or_else(|_| Self::Str(value.to_string()), Self::Int)
    }
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Str(value) => write!(f, "\"{value}\""),
        }
    }
}

/// Ordered tuple identifying a cached query result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<KeySegment>);

impl QueryKey {
    /// Start a key from its root segment, e.g. `QueryKey::new("posts")`.
    pub fn new(root: impl Into<KeySegment>) -> Self {
        Self(vec![root.into()])
    }

    /// Append a segment.
    #[must_use]
    pub fn with(mut self, segment: impl Into<KeySegment>) -> Self {
        self.0.push(segment.into());
        self
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    /// True when `prefix` is a leading run of this key (a key is its own prefix).
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, segment) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{segment}")?;
        }
        f.write_str("]")
    }
}

/// Selects cache entries for invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter {
    pub key: QueryKey,
    /// Match only `key` itself instead of every key it prefixes.
    pub exact: bool,
}

impl QueryFilter {
    pub fn exact(key: QueryKey) -> Self {
        Self { key, exact: true }
    }

    pub fn family(key: QueryKey) -> Self {
        Self { key, exact: false }
    }

    pub fn matches(&self, key: &QueryKey) -> bool {
        if self.exact {
            key == &self.key
        } else {
            key.starts_with(&self.key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_with_same_segments_are_equal() {
        let a = QueryKey::new("posts").with(3u32);
        let b = QueryKey::new("posts").with(3i64);
        assert_eq!(a, b);
        assert_ne!(a, QueryKey::new("comments").with(3u32));
    }

    #[test]
    fn display_renders_tuple() {
        let key = QueryKey::new("posts").with(2u32);
        assert_eq!(key.to_string(), "[\"posts\", 2]");
    }

    #[test]
    fn exact_filter_ignores_children() {
        let filter = QueryFilter::exact(QueryKey::new("posts"));
        assert!(filter.matches(&QueryKey::new("posts")));
        assert!(!filter.matches(&QueryKey::new("posts").with(1u32)));
    }

    #[test]
    fn family_filter_matches_children() {
        let filter = QueryFilter::family(QueryKey::new("posts"));
        assert!(filter.matches(&QueryKey::new("posts")));
        assert!(filter.matches(&QueryKey::new("posts").with(7u32)));
        assert!(!filter.matches(&QueryKey::new("comments").with(7u32)));
        assert!(!filter.matches(&QueryKey::new("postsx")));
    }

    #[test]
    fn large_ids_fall_back_to_string_segments() {
        let key = QueryKey::new("comments").with(u64::MAX);
        assert_eq!(
            key.segments()[1],
            KeySegment::Str(u64::MAX.to_string())
        );
    }
}
