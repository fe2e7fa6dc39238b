use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedSource {
    pub url: String,
    pub label: String,
}

/// One item as the feed published it; nothing is parsed or cleaned yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    /// Only set when the feed marks the guid as a permalink.
    pub permalink: Option<String>,
    pub published: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
}

// Listing envelope for `digest feeds`
#[derive(Serialize)]
pub struct FeedList<'a> {
    pub feeds: &'a [FeedSource],
    pub keywords: usize,
    pub max_entries_per_feed: usize,
}
