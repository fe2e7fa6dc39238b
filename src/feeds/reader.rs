use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::config::FetchConfig;

use super::types::{FeedSource, RawEntry};
use super::{fetch, parse};

/// Produces the raw entries of one feed. Failures are per feed.
#[async_trait]
pub trait FeedReader: Send + Sync {
    async fn read(&self, source: &FeedSource) -> Result<Vec<RawEntry>, FeedError>;
}

pub struct HttpFeedReader {
    client: Client,
}

impl HttpFeedReader {
    pub fn new(cfg: &FetchConfig) -> Result<Self, FeedError> {
        let client = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(FeedError::from_reqwest)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedReader for HttpFeedReader {
    async fn read(&self, source: &FeedSource) -> Result<Vec<RawEntry>, FeedError> {
        let xml = fetch::fetch_rss(&self.client, &source.url).await?;
        parse::parse_feed(&xml)
    }
}

#[derive(Debug)]
pub enum FeedError {
    Http(reqwest::Error),
    Timeout,
    Status(StatusCode),
    Parse(String),
}

impl FeedError {
    pub(super) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() { FeedError::Timeout } else { FeedError::Http(err) }
    }
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedError::Http(err) => write!(f, "feed unreachable: {err}"),
            FeedError::Timeout => write!(f, "feed fetch timed out"),
            FeedError::Status(status) => write!(f, "feed returned {status}"),
            FeedError::Parse(msg) => write!(f, "feed unparsable: {msg}"),
        }
    }
}

impl std::error::Error for FeedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FeedError::Http(err) => Some(err),
            _ => None,
        }
    }
}
