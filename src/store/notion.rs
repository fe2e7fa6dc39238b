use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::article::dedup::KnownArticles;
use crate::config::{NotionConfig, NotionProperties};
use crate::util::text::truncate_chars;

use super::{DestinationStore, ProcessedRecord, StoreError};

const PAGE_SIZE: u32 = 100;
const RICH_TEXT_MAX_CHARS: usize = 2000;
const SELECT_MAX_CHARS: usize = 100;
const DEFAULT_SELECT: &str = "General";

/// Notion database: pages are rows, properties are columns.
pub struct NotionStore {
    http: Client,
    base_url: String,
    database_id: String,
    props: NotionProperties,
}

impl NotionStore {
    pub fn new(cfg: &NotionConfig, token: &str, database_id: &str) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| StoreError::Config("token is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, auth);
        let version = HeaderValue::from_str(&cfg.version)
            .map_err(|_| StoreError::Config(format!("bad api version {:?}", cfg.version)))?;
        headers.insert("notion-version", version);

        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(StoreError::from_reqwest)?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            database_id: database_id.to_string(),
            props: cfg.properties.clone(),
        })
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, StoreError> {
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(StoreError::from_reqwest)?;
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(StoreError::from_reqwest)?;
        if !status.is_success() {
            let message = serde_json::from_slice::<Value>(&bytes)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| truncate_chars(&String::from_utf8_lossy(&bytes), 200));
            return Err(StoreError::Api { status: status.as_u16(), message });
        }
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

#[async_trait]
impl DestinationStore for NotionStore {
    async fn known_articles(&self, since: Option<DateTime<Utc>>) -> Result<KnownArticles, StoreError> {
        let url = format!("{}/databases/{}/query", self.base_url, self.database_id);
        let since = since.map(|ts| ts.date_naive());
        let mut known = KnownArticles::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;
        loop {
            let body = query_body(&self.props, since, cursor.as_deref());
            let resp = self.post(&url, &body).await?;
            let page = parse_query_page(&resp, &self.props)?;
            pages += 1;
            for (source, title) in &page.rows {
                known.insert(source.as_deref().unwrap_or(""), title.as_deref());
            }
            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }
        debug!(pages, urls = known.url_count(), "loaded known articles");
        Ok(known)
    }

    async fn append(&self, record: &ProcessedRecord) -> Result<(), StoreError> {
        let url = format!("{}/pages", self.base_url);
        let body = page_payload(&self.database_id, &self.props, record, Utc::now().date_naive());
        self.post(&url, &body).await?;
        Ok(())
    }
}

pub(crate) fn query_body(props: &NotionProperties, since: Option<NaiveDate>, cursor: Option<&str>) -> Value {
    let mut body = json!({ "page_size": PAGE_SIZE });
    if let Some(c) = cursor {
        body["start_cursor"] = json!(c);
    }
    if let Some(day) = since {
        body["filter"] = json!({
            "property": props.date,
            "date": { "on_or_after": day.format("%Y-%m-%d").to_string() }
        });
    }
    body
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct QueryPage {
    /// (source url, title) per row.
    pub rows: Vec<(Option<String>, Option<String>)>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

pub(crate) fn parse_query_page(resp: &Value, props: &NotionProperties) -> Result<QueryPage, StoreError> {
    let results = resp
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| StoreError::Decode("query response has no results array".into()))?;

    let rows = results
        .iter()
        .map(|page| {
            let properties = page.get("properties");
            let source = properties
                .and_then(|p| p.get(&props.source))
                .and_then(|p| p.get("url"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let title = properties
                .and_then(|p| p.get(&props.title))
                .and_then(|p| p.get("title"))
                .and_then(Value::as_array)
                .map(|parts| {
                    parts
                        .iter()
                        .filter_map(|t| t.get("plain_text").and_then(Value::as_str))
                        .collect::<String>()
                })
                .filter(|t| !t.is_empty());
            (source, title)
        })
        .collect();

    Ok(QueryPage {
        rows,
        has_more: resp.get("has_more").and_then(Value::as_bool).unwrap_or(false),
        next_cursor: resp.get("next_cursor").and_then(Value::as_str).map(str::to_string),
    })
}

fn rich_text(content: &str) -> Value {
    let content = truncate_chars(content.trim(), RICH_TEXT_MAX_CHARS);
    if content.is_empty() {
        return json!({ "rich_text": [] });
    }
    json!({ "rich_text": [{ "text": { "content": content } }] })
}

// Option names may not contain commas.
fn select_option(value: &str) -> Value {
    let name = truncate_chars(value.replace(',', "").trim(), SELECT_MAX_CHARS);
    let name = if name.trim().is_empty() { DEFAULT_SELECT.to_string() } else { name.trim().to_string() };
    json!({ "multi_select": [{ "name": name }] })
}

/// Request body creating one row for `record`. Rows without a publication date carry `today`.
pub(crate) fn page_payload(
    database_id: &str,
    props: &NotionProperties,
    record: &ProcessedRecord,
    today: NaiveDate,
) -> Value {
    let uc = record.use_case.as_ref();
    let title = truncate_chars(record.display_title().trim(), RICH_TEXT_MAX_CHARS);
    let date = record.published_at.map(|ts| ts.date_naive()).unwrap_or(today);
    let source = if record.url.is_empty() { Value::Null } else { json!(record.url) };

    let mut properties = Map::new();
    properties.insert(props.title.clone(), json!({ "title": [{ "text": { "content": title } }] }));
    properties.insert(props.problem.clone(), rich_text(&record.summary));
    properties.insert(props.ai_solution.clone(), rich_text(uc.map(|u| u.ai_solution.as_str()).unwrap_or("")));
    properties.insert(props.category.clone(), select_option(uc.map(|u| u.category.as_str()).unwrap_or("")));
    properties.insert(props.industry.clone(), select_option(uc.map(|u| u.industry.as_str()).unwrap_or("")));
    properties.insert(props.source.clone(), json!({ "url": source }));
    properties.insert(props.date.clone(), json!({ "date": { "start": date.format("%Y-%m-%d").to_string() } }));
    properties.insert(props.feed.clone(), rich_text(&record.source_label));

    json!({
        "parent": { "database_id": database_id },
        "properties": Value::Object(properties),
    })
}
