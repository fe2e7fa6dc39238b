use std::marker::PhantomData;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn, Span};

use super::emit;
use super::ops::run::Run;
use crate::output::types::Meta;
use crate::pipeline::report::{Counts, FeedReport};

pub trait PhaseSpan {
    fn name(&self) -> &'static str;
    fn span(&self) -> Span;
}

pub trait OpMarker {
    const NAME: &'static str;
    type Phase: PhaseSpan;
    fn root_span() -> Span;
}

/// Logging handle typed by command; `json` switches to key=value details for machine-read logs.
pub struct LogCtx<O: OpMarker> {
    pub(crate) json: bool,
    pub(crate) _marker: PhantomData<O>,
}

impl<O: OpMarker> LogCtx<O> {
    pub(crate) fn new(json: bool) -> Self {
        Self { json, _marker: PhantomData }
    }

    fn op_name(&self) -> &'static str { O::NAME }

    pub fn root_span(&self) -> Span { O::root_span() }

    pub fn root_span_kv<'a, T>(&self, fields: T) -> Span
    where
        T: IntoIterator<Item = (&'a str, String)>,
    {
        let span = self.root_span();
        let details = kv_to_string(fields);
        if details.is_empty() {
            info!(op = %self.op_name(), "start");
        } else {
            info!(op = %self.op_name(), details = %details, "start");
        }
        span
    }

    pub fn span(&self, ph: &O::Phase) -> Span { ph.span() }

    pub fn span_kv<'a, T>(&self, ph: &O::Phase, fields: T) -> Span
    where
        T: IntoIterator<Item = (&'a str, String)>,
    {
        let span = self.span(ph);
        let details = kv_to_string(fields);
        if details.is_empty() {
            debug!(op = %self.op_name(), phase = ph.name(), "span_start");
        } else {
            debug!(op = %self.op_name(), phase = ph.name(), details = %details, "span_start");
        }
        span
    }

    pub fn info(&self, msg: impl AsRef<str>) { if self.json { info!(op = %self.op_name(), "{}", msg.as_ref()); } else { info!("{}", msg.as_ref()); } }
    pub fn warn(&self, msg: impl AsRef<str>) { if self.json { warn!(op = %self.op_name(), "{}", msg.as_ref()); } else { warn!("{}", msg.as_ref()); } }

    pub fn info_kv<'a, D>(&self, msg: &str, kv: D)
    where
        D: IntoIterator<Item = (&'a str, String)>,
    {
        let details = kv_to_string(kv);
        if self.json { info!(op = %self.op_name(), details = %details, "{}", msg); }
        else { info!("{} {}", msg, details); }
    }

    pub fn debug_kv<'a, D>(&self, msg: &str, kv: D)
    where
        D: IntoIterator<Item = (&'a str, String)>,
    {
        let details = kv_to_string(kv);
        if self.json { debug!(op = %self.op_name(), details = %details, "{}", msg); }
        else { debug!("{} {}", msg, details); }
    }

    pub fn warn_kv<'a, D>(&self, msg: &str, kv: D)
    where
        D: IntoIterator<Item = (&'a str, String)>,
    {
        let details = kv_to_string(kv);
        if self.json { warn!(op = %self.op_name(), details = %details, "{}", msg); }
        else { warn!("{} {}", msg, details); }
    }

    pub fn plan<T: Serialize>(&self, plan: &T, meta: Option<Meta>) -> Result<()> { emit::print_plan(self.op_name(), plan, meta) }
    pub fn result<T: Serialize>(&self, result: &T, meta: Option<Meta>) -> Result<()> { emit::print_result(self.op_name(), result, meta) }
}

// Run-specific summaries
impl LogCtx<Run> {
    pub fn feed_summary(&self, feed: &FeedReport) {
        let c = &feed.counts;
        if let Some(err) = &feed.error {
            if self.json { warn!(op = %self.op_name(), feed = %feed.label, error = %err, "feed_failed"); }
            else { warn!("❌ Feed {} — {}", feed.label, err); }
            return;
        }
        if self.json {
            info!(op = %self.op_name(), feed = %feed.label, fetched = c.fetched, filtered = c.filtered(),
                duplicate = c.filtered_duplicate, summarized = c.summarized, written = c.written, failed = c.failed,
                "feed_summary");
        } else {
            info!("✅ Feed {} — fetched={} filtered={} duplicate={} summarized={} written={} failed={}",
                feed.label, c.fetched, c.filtered(), c.filtered_duplicate, c.summarized, c.written, c.failed);
        }
    }

    pub fn totals(&self, c: &Counts, dry_run: bool) {
        if self.json {
            info!(op = %self.op_name(), dry_run, fetched = c.fetched, no_link = c.filtered_no_link,
                short = c.filtered_short, stale = c.filtered_stale, duplicate = c.filtered_duplicate,
                irrelevant = c.filtered_irrelevant, summarized = c.summarized, written = c.written,
                failed = c.failed, "run_totals");
        } else {
            let written = if dry_run { "planned" } else { "written" };
            info!("📊 Run totals — fetched={} no_link={} short={} stale={} duplicate={} irrelevant={} summarized={} {}={} failed={}",
                c.fetched, c.filtered_no_link, c.filtered_short, c.filtered_stale, c.filtered_duplicate,
                c.filtered_irrelevant, c.summarized, written, c.written, c.failed);
        }
    }
}

fn kv_to_string<'a, T>(kv: T) -> String
where
    T: IntoIterator<Item = (&'a str, String)>,
{
    let mut parts: Vec<String> = Vec::new();
    for (k, v) in kv { parts.push(format!("{}={}", k, v)); }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_details_join_in_order() {
        let s = kv_to_string([("feed", "A".to_string()), ("entries", "5".to_string())]);
        assert_eq!(s, "feed=A entries=5");
        assert_eq!(kv_to_string(Vec::<(&str, String)>::new()), "");
    }
}
