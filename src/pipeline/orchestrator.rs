use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::Instrument;

use crate::article::dedup::{is_duplicate, KnownArticles};
use crate::article::filter::FilterPolicy;
use crate::article::normalize::normalize;
use crate::article::NormalizedArticle;
use crate::config::DigestConfig;
use crate::feeds::{FeedReader, FeedSource};
use crate::store::{DestinationStore, ProcessedRecord};
use crate::summarize::{SummarizeError, Summarizer};
use crate::telemetry::{self, ctx::LogCtx};
use crate::telemetry::ops::run::{Phase, Run};
use crate::util::text::excerpt;

use super::report::{Counts, FeedReport, RunReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    FetchingFeeds,
    ProcessingEntries,
    Done,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Fetch, filter and dedup only; nothing is summarized or written.
    pub dry_run: bool,
    pub max_entries_per_feed: usize,
    /// Pause between consecutive store writes.
    pub write_delay: Duration,
    /// Budget for summarizing one article, retries included.
    pub article_timeout: Duration,
    /// Length of the stored excerpt when no summarizer is configured.
    pub excerpt_chars: usize,
    /// Only rows this recent seed the duplicate check.
    pub dedup_window: Option<chrono::Duration>,
}

impl RunOptions {
    pub fn from_config(cfg: &DigestConfig, dry_run: bool) -> Self {
        Self {
            dry_run,
            max_entries_per_feed: cfg.max_entries_per_feed,
            write_delay: Duration::from_millis(cfg.write_delay_ms),
            article_timeout: Duration::from_secs(cfg.summarizer.article_timeout_secs),
            excerpt_chars: cfg.excerpt_chars,
            dedup_window: cfg.notion.dedup_window_days.map(|d| chrono::Duration::days(i64::from(d))),
        }
    }
}

/// Sequential run over all feeds: one bulk store read, then per feed
/// fetch, normalize, filter, dedup, summarize and write, one entry at a time.
pub struct Pipeline<'a> {
    reader: &'a dyn FeedReader,
    filter: &'a FilterPolicy,
    summarizer: Option<&'a dyn Summarizer>,
    store: &'a dyn DestinationStore,
    opts: RunOptions,
    state: RunState,
    attempted_write: bool,
    log: LogCtx<Run>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        reader: &'a dyn FeedReader,
        filter: &'a FilterPolicy,
        summarizer: Option<&'a dyn Summarizer>,
        store: &'a dyn DestinationStore,
        opts: RunOptions,
    ) -> Self {
        Self {
            reader,
            filter,
            summarizer,
            store,
            opts,
            state: RunState::NotStarted,
            attempted_write: false,
            log: telemetry::run(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Only the bulk store read can fail the run; feed and entry failures end up in the report.
    pub async fn run(&mut self, feeds: &[FeedSource], now: DateTime<Utc>) -> Result<RunReport> {
        let since = self.opts.dedup_window.map(|w| now - w);
        let mut known = self
            .store
            .known_articles(since)
            .await
            .context("load existing articles from the store")?;
        self.log.info_kv("🗂️ Known articles loaded", [("urls", known.url_count().to_string())]);

        let mut report = RunReport::new(now, self.opts.dry_run);
        for source in feeds {
            self.state = RunState::FetchingFeeds;
            let span = self.log.span_kv(&Phase::Feed, [("label", source.label.clone()), ("url", source.url.clone())]);
            let feed = self.process_feed(source, &mut known, now).instrument(span).await;
            self.log.feed_summary(&feed);
            report.push(feed);
        }

        self.state = RunState::Done;
        self.log.totals(&report.totals, self.opts.dry_run);
        Ok(report)
    }

    async fn process_feed(&mut self, source: &FeedSource, known: &mut KnownArticles, now: DateTime<Utc>) -> FeedReport {
        let mut counts = Counts::default();
        let entries = match self.reader.read(source).instrument(self.log.span(&Phase::Fetch)).await {
            Ok(entries) => entries,
            Err(err) => {
                return FeedReport {
                    label: source.label.clone(),
                    url: source.url.clone(),
                    counts,
                    error: Some(err.to_string()),
                };
            }
        };

        self.state = RunState::ProcessingEntries;
        for raw in entries.iter().take(self.opts.max_entries_per_feed) {
            counts.fetched += 1;
            let article = {
                let _s = self.log.span(&Phase::Normalize).entered();
                normalize(raw)
            };
            if !article.has_identity() {
                counts.filtered_no_link += 1;
                self.log.debug_kv("↩️ skip", [("reason", "no-link".to_string()), ("title", article.title.clone())]);
                continue;
            }

            {
                let _s = self.log.span(&Phase::Filter).entered();
                if let Err(reason) = self.filter.check(&article, now) {
                    counts.reject(reason);
                    self.log.debug_kv("↩️ skip", [("reason", reason.as_str().to_string()), ("url", article.url.clone())]);
                    continue;
                }
                if is_duplicate(&article, known) {
                    counts.filtered_duplicate += 1;
                    self.log.debug_kv("↩️ skip", [("reason", "duplicate".to_string()), ("url", article.url.clone())]);
                    continue;
                }
            }

            let record = match self.build_record(&article, source).await {
                Ok(record) => record,
                Err(err) => {
                    counts.failed += 1;
                    self.log.warn_kv("⚠️ summarize failed", [("url", article.url.clone()), ("error", err.to_string())]);
                    continue;
                }
            };
            if record.use_case.is_some() {
                counts.summarized += 1;
            }

            if self.opts.dry_run {
                counts.written += 1;
                self.log.info_kv("📝 would write", [("title", record.display_title().to_string()), ("url", record.url.clone())]);
                remember(known, &article, &record);
                continue;
            }

            if self.attempted_write && !self.opts.write_delay.is_zero() {
                tokio::time::sleep(self.opts.write_delay).await;
            }
            self.attempted_write = true;
            match self.store.append(&record).instrument(self.log.span(&Phase::Write)).await {
                Ok(()) => {
                    counts.written += 1;
                    self.log.info_kv("➕ written", [("title", record.display_title().to_string()), ("url", record.url.clone())]);
                    remember(known, &article, &record);
                }
                Err(err) => {
                    counts.failed += 1;
                    self.log.warn_kv("⚠️ write failed", [("url", record.url.clone()), ("error", err.to_string())]);
                }
            }
        }

        FeedReport { label: source.label.clone(), url: source.url.clone(), counts, error: None }
    }

    async fn build_record(&self, article: &NormalizedArticle, source: &FeedSource) -> Result<ProcessedRecord, SummarizeError> {
        let use_case = match self.summarizer {
            Some(summarizer) if !self.opts.dry_run => {
                let call = summarizer.summarize(&article.text).instrument(self.log.span(&Phase::Summarize));
                match tokio::time::timeout(self.opts.article_timeout, call).await {
                    Ok(result) => Some(result?),
                    Err(_) => return Err(SummarizeError::Timeout),
                }
            }
            _ => None,
        };
        let summary = match &use_case {
            Some(uc) => uc.problem_with_note(),
            None => excerpt(&article.text, self.opts.excerpt_chars),
        };
        Ok(ProcessedRecord {
            title: article.title.clone(),
            url: article.url.clone(),
            summary,
            use_case,
            published_at: article.published_at,
            source_label: source.label.clone(),
        })
    }
}

// Later feeds in the same run must see what this one produced.
fn remember(known: &mut KnownArticles, article: &NormalizedArticle, record: &ProcessedRecord) {
    known.insert(&article.url, Some(&article.title));
    if record.display_title() != article.title {
        known.insert("", Some(record.display_title()));
    }
}
