use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::article::filter::{KeywordMatch, UnknownDatePolicy};
use crate::feeds::types::FeedSource;

pub const ENV_OPENROUTER_KEY: &str = "OPENROUTER_KEY";
pub const ENV_NOTION_TOKEN: &str = "NOTION_TOKEN";
pub const ENV_NOTION_DATABASE_ID: &str = "NOTION_DATABASE_ID";

const DEFAULT_FEEDS: &[(&str, &str)] = &[
    ("https://industry4o.com/feed", "Industry 4.0"),
    ("https://www.manufacturingdive.com/feeds/news/", "Manufacturing Dive"),
    ("https://venturebeat.com/category/ai/feed/", "VentureBeat AI"),
];

const DEFAULT_KEYWORDS: &[&str] = &[
    // AI / ML
    "ai", "artificial intelligence", "machine learning", "ml", "deep learning", "neural network",
    "llm", "large language model", "generative ai", "genai", "computer vision", "object detection",
    "anomaly detection", "predictive maintenance", "predictive analytics", "reinforcement learning",
    // Industry 4.0 / IIoT
    "industry 4.0", "iiot", "industrial iot", "digital twin", "smart factory", "edge ai",
    "industrial automation",
    // robotics
    "robot", "robotics", "cobot", "amr", "agv", "robotic", "robotics vision",
    // quality / production
    "quality control", "visual inspection", "defect detection", "inspection", "process optimization",
    "downtime", "yield", "throughput", "oee", "cnc", "3d printing", "additive manufacturing",
    // supply chain
    "supply chain", "logistics", "warehouse", "inventory", "demand forecasting",
    // sectors
    "automotive", "food", "semiconductor", "electronics", "pharma", "aerospace",
];

/// Full run configuration. Every field has a default so a config file only
/// needs to name what it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub feeds: Vec<FeedSource>,
    pub keywords: Vec<String>,
    pub filter: FilterConfig,
    pub fetch: FetchConfig,
    pub summarizer: SummarizerConfig,
    pub notion: NotionConfig,
    /// Entries taken from the head of each feed.
    pub max_entries_per_feed: usize,
    /// Pause after each store write.
    pub write_delay_ms: u64,
    /// Length of the raw excerpt stored when summarization is disabled.
    pub excerpt_chars: usize,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            feeds: DEFAULT_FEEDS
                .iter()
                .map(|(url, label)| FeedSource { url: url.to_string(), label: label.to_string() })
                .collect(),
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            filter: FilterConfig::default(),
            fetch: FetchConfig::default(),
            summarizer: SummarizerConfig::default(),
            notion: NotionConfig::default(),
            max_entries_per_feed: 5,
            write_delay_ms: 8_000,
            excerpt_chars: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub max_age_days: u32,
    pub unknown_date: UnknownDatePolicy,
    pub keyword_match: KeywordMatch,
    /// 0 disables the length check.
    pub min_text_chars: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_age_days: 7,
            unknown_date: UnknownDatePolicy::Accept,
            keyword_match: KeywordMatch::WholeWord,
            min_text_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            user_agent: concat!("usecase-digest/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub enabled: bool,
    pub base_url: String,
    pub primary_model: String,
    pub fallback_model: String,
    pub primary_max_tokens: u32,
    pub fallback_max_tokens: u32,
    pub temperature: f32,
    /// Per model call.
    pub call_timeout_secs: u64,
    /// Whole extraction for one article, all chunks and retries included.
    pub article_timeout_secs: u64,
    pub max_rate_limit_retries: u32,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    pub chunk_chars: usize,
    pub call_delay_ms: u64,
    pub referer: String,
    pub app_title: String,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            primary_model: "google/gemma-9b:free".to_string(),
            fallback_model: "qwen/qwen-7b-instruct:free".to_string(),
            primary_max_tokens: 600,
            fallback_max_tokens: 800,
            temperature: 0.2,
            call_timeout_secs: 60,
            article_timeout_secs: 180,
            max_rate_limit_retries: 3,
            backoff_initial_ms: 2_000,
            backoff_max_ms: 30_000,
            chunk_chars: 4_000,
            call_delay_ms: 1_000,
            referer: "https://github.com/ai-manufacturing-digest".to_string(),
            app_title: "AI Use Case Extractor".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotionConfig {
    pub base_url: String,
    pub version: String,
    pub timeout_secs: u64,
    /// Only rows dated within this many days seed the duplicate check. None reads all rows.
    pub dedup_window_days: Option<u32>,
    pub properties: NotionProperties,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.notion.com/v1".to_string(),
            version: "2022-06-28".to_string(),
            timeout_secs: 30,
            dedup_window_days: None,
            properties: NotionProperties::default(),
        }
    }
}

/// Column names of the destination database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotionProperties {
    pub title: String,
    pub problem: String,
    pub ai_solution: String,
    pub category: String,
    pub industry: String,
    pub source: String,
    pub date: String,
    pub feed: String,
}

impl Default for NotionProperties {
    fn default() -> Self {
        Self {
            title: "Title".into(),
            problem: "Problem".into(),
            ai_solution: "AI Solution".into(),
            category: "Category".into(),
            industry: "Industry".into(),
            source: "Source".into(),
            date: "Date".into(),
            feed: "Feed".into(),
        }
    }
}

impl DigestConfig {
    /// Built-in defaults, or the JSON file at `path` layered over them.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("read config {}", p.display()))?;
                serde_json::from_str::<DigestConfig>(&raw)
                    .with_context(|| format!("parse config {}", p.display()))?
            }
            None => DigestConfig::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.feeds.is_empty() {
            bail!("config lists no feeds");
        }
        for f in &self.feeds {
            let u = Url::parse(&f.url).with_context(|| format!("invalid feed url: {}", f.url))?;
            if u.scheme() != "http" && u.scheme() != "https" {
                bail!("feed url must be http(s): {}", f.url);
            }
        }
        if self.keywords.iter().all(|k| k.trim().is_empty()) {
            bail!("config lists no keywords; every entry would be rejected as irrelevant");
        }
        if self.summarizer.chunk_chars == 0 {
            bail!("summarizer.chunk_chars must be positive");
        }
        Ok(())
    }
}

/// Credentials, read from the environment only.
#[derive(Clone)]
pub struct Secrets {
    pub openrouter_key: Option<String>,
    pub notion_token: String,
    pub notion_database_id: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("openrouter_key", &self.openrouter_key.as_ref().map(|_| "***"))
            .field("notion_token", &"***")
            .field("notion_database_id", &self.notion_database_id)
            .finish()
    }
}

impl Secrets {
    pub fn from_env(need_llm: bool) -> Result<Self> {
        Self::from_lookup(need_llm, |k| std::env::var(k).ok())
    }

    /// Reports every missing variable at once.
    pub fn from_lookup<F>(need_llm: bool, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let openrouter_key = get(ENV_OPENROUTER_KEY);
        let notion_token = get(ENV_NOTION_TOKEN);
        let notion_database_id = get(ENV_NOTION_DATABASE_ID);

        let mut missing = Vec::new();
        if need_llm && openrouter_key.is_none() { missing.push(ENV_OPENROUTER_KEY); }
        if notion_token.is_none() { missing.push(ENV_NOTION_TOKEN); }
        if notion_database_id.is_none() { missing.push(ENV_NOTION_DATABASE_ID); }
        match (notion_token, notion_database_id) {
            (Some(notion_token), Some(notion_database_id)) if missing.is_empty() => Ok(Self {
                openrouter_key,
                notion_token,
                notion_database_id,
            }),
            _ => bail!(
                "missing required environment variable(s): {} (set them in the environment or a .env file)",
                missing.join(", ")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = DigestConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.feeds.len(), 3);
        assert_eq!(cfg.filter.max_age_days, 7);
        assert_eq!(cfg.filter.unknown_date, UnknownDatePolicy::Accept);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: DigestConfig = serde_json::from_str(
            r#"{"feeds":[{"url":"https://example.com/rss","label":"Example"}],
                "filter":{"max_age_days":3,"unknown_date":"reject"}}"#,
        )
        .unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.feeds.len(), 1);
        assert_eq!(cfg.filter.max_age_days, 3);
        assert_eq!(cfg.filter.unknown_date, UnknownDatePolicy::Reject);
        assert_eq!(cfg.filter.min_text_chars, 200);
        assert_eq!(cfg.max_entries_per_feed, 5);
        assert_eq!(cfg.notion.properties.source, "Source");
    }

    #[test]
    fn rejects_non_http_feed() {
        let mut cfg = DigestConfig::default();
        cfg.feeds = vec![FeedSource { url: "ftp://example.com/feed".into(), label: "x".into() }];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_secrets_are_listed_together() {
        let vars = env(&[(ENV_NOTION_TOKEN, "secret")]);
        let err = Secrets::from_lookup(true, |k| vars.get(k).cloned()).unwrap_err().to_string();
        assert!(err.contains(ENV_OPENROUTER_KEY));
        assert!(err.contains(ENV_NOTION_DATABASE_ID));
        assert!(!err.contains(ENV_NOTION_TOKEN));
    }

    #[test]
    fn llm_key_optional_without_summarizer() {
        let vars = env(&[(ENV_NOTION_TOKEN, "t"), (ENV_NOTION_DATABASE_ID, "db")]);
        let s = Secrets::from_lookup(false, |k| vars.get(k).cloned()).unwrap();
        assert!(s.openrouter_key.is_none());
        assert_eq!(s.notion_database_id, "db");
        assert!(Secrets::from_lookup(true, |k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn blank_secret_counts_as_missing() {
        let vars = env(&[(ENV_NOTION_TOKEN, "  "), (ENV_NOTION_DATABASE_ID, "db")]);
        assert!(Secrets::from_lookup(false, |k| vars.get(k).cloned()).is_err());
    }
}
