use chrono::{DateTime, Utc};

pub mod dedup;
pub mod filter;
pub mod normalize;

/// Canonical form of one feed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedArticle {
    pub title: String,
    /// Dedup identity. Empty when the feed gave neither a link nor a permalink guid.
    pub url: String,
    /// None means the age is unknown; see `filter::UnknownDatePolicy`.
    pub published_at: Option<DateTime<Utc>>,
    pub text: String,
}

impl NormalizedArticle {
    pub fn has_identity(&self) -> bool {
        !self.url.is_empty()
    }
}
