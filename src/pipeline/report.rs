use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::article::filter::Rejection;

/// Per-entry outcome tallies. Every fetched entry lands in exactly one of the
/// other counters, except `summarized` which also counts entries later written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub fetched: usize,
    pub filtered_no_link: usize,
    pub filtered_short: usize,
    pub filtered_stale: usize,
    pub filtered_duplicate: usize,
    pub filtered_irrelevant: usize,
    pub summarized: usize,
    pub written: usize,
    pub failed: usize,
}

impl Counts {
    pub fn add(&mut self, other: &Counts) {
        self.fetched += other.fetched;
        self.filtered_no_link += other.filtered_no_link;
        self.filtered_short += other.filtered_short;
        self.filtered_stale += other.filtered_stale;
        self.filtered_duplicate += other.filtered_duplicate;
        self.filtered_irrelevant += other.filtered_irrelevant;
        self.summarized += other.summarized;
        self.written += other.written;
        self.failed += other.failed;
    }

    pub fn reject(&mut self, reason: Rejection) {
        match reason {
            Rejection::TooShort => self.filtered_short += 1,
            Rejection::Stale => self.filtered_stale += 1,
            Rejection::Irrelevant => self.filtered_irrelevant += 1,
        }
    }

    pub fn filtered(&self) -> usize {
        self.filtered_no_link
            + self.filtered_short
            + self.filtered_stale
            + self.filtered_duplicate
            + self.filtered_irrelevant
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedReport {
    pub label: String,
    pub url: String,
    #[serde(flatten)]
    pub counts: Counts,
    /// Fetch or parse failure; the counts are then all zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    pub feeds: Vec<FeedReport>,
    pub totals: Counts,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>, dry_run: bool) -> Self {
        Self { run_id: Uuid::new_v4(), started_at, dry_run, feeds: Vec::new(), totals: Counts::default() }
    }

    pub fn push(&mut self, feed: FeedReport) {
        self.totals.add(&feed.counts);
        self.feeds.push(feed);
    }

    pub fn failed_feeds(&self) -> usize {
        self.feeds.iter().filter(|f| f.error.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_accumulate_per_feed() {
        let mut report = RunReport::new(Utc::now(), false);
        let mut a = Counts { fetched: 3, written: 2, ..Counts::default() };
        a.reject(Rejection::Stale);
        report.push(FeedReport { label: "A".into(), url: "https://a.example/rss".into(), counts: a, error: None });
        report.push(FeedReport {
            label: "B".into(),
            url: "https://b.example/rss".into(),
            counts: Counts::default(),
            error: Some("feed returned 503 Service Unavailable".into()),
        });
        assert_eq!(report.totals.fetched, 3);
        assert_eq!(report.totals.filtered_stale, 1);
        assert_eq!(report.totals.filtered(), 1);
        assert_eq!(report.failed_feeds(), 1);
    }

    #[test]
    fn feed_counts_serialize_flat() {
        let feed = FeedReport {
            label: "A".into(),
            url: "u".into(),
            counts: Counts { fetched: 2, ..Counts::default() },
            error: None,
        };
        let v = serde_json::to_value(&feed).unwrap();
        assert_eq!(v["fetched"], 2);
        assert!(v.get("counts").is_none());
        assert!(v.get("error").is_none());
    }
}
