use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::article::dedup::KnownArticles;
use crate::summarize::UseCase;

pub mod notion;

pub use notion::NotionStore;

/// One row bound for the destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedRecord {
    pub title: String,
    pub url: String,
    /// Problem text (with note) when summarized, raw excerpt otherwise.
    pub summary: String,
    pub use_case: Option<UseCase>,
    pub published_at: Option<DateTime<Utc>>,
    pub source_label: String,
}

impl ProcessedRecord {
    /// Title written to the store: the use case title when there is one.
    pub fn display_title(&self) -> &str {
        match &self.use_case {
            Some(uc) if !uc.title.trim().is_empty() => &uc.title,
            _ => &self.title,
        }
    }
}

#[derive(Debug)]
pub enum StoreError {
    Http(reqwest::Error),
    Timeout,
    Api { status: u16, message: String },
    Decode(String),
    Config(String),
}

impl StoreError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() { StoreError::Timeout } else { StoreError::Http(err) }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Http(err) => write!(f, "store unreachable: {err}"),
            StoreError::Timeout => write!(f, "store request timed out"),
            StoreError::Api { status, message } => write!(f, "store api error {status}: {message}"),
            StoreError::Decode(msg) => write!(f, "unexpected store response: {msg}"),
            StoreError::Config(msg) => write!(f, "store misconfigured: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Http(err) => Some(err),
            _ => None,
        }
    }
}

/// The external database rows are appended to.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// One bulk read of what is already stored, optionally limited to rows dated on or after `since`.
    async fn known_articles(&self, since: Option<DateTime<Utc>>) -> Result<KnownArticles, StoreError>;

    async fn append(&self, record: &ProcessedRecord) -> Result<(), StoreError>;
}
