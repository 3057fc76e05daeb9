use std::fmt;

/// Canonical product phrase used as the cache key.
///
/// Only [`QueryNormalizer`](crate::domain::rules::QueryNormalizer) builds
/// these, so every value is already lowercase, punctuation-free and
/// deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedQuery(String);

impl NormalizedQuery {
    pub(crate) fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedQuery {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<NormalizedQuery> for String {
    fn from(query: NormalizedQuery) -> Self {
        query.0
    }
}
