use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::config::DigestConfig;
use crate::telemetry::{self};
use crate::telemetry::ops::feeds::Phase as FeedsPhase;

mod fetch;
mod parse;
pub mod reader;
pub mod types;

pub use reader::{FeedReader, HttpFeedReader};
pub use types::FeedSource;

/// digest feeds: list the configured sources
#[derive(Args)]
pub struct FeedsCmd {
    /// JSON config file layered over the built-in defaults
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: FeedsCmd) -> Result<()> {
    let log = telemetry::feeds();
    let _g = log.root_span_kv([("config", format!("{:?}", args.config))]).entered();
    let cfg = DigestConfig::load(args.config.as_deref())?;

    let _s = log.span(&FeedsPhase::List).entered();
    log.info(format!("📡 Feeds ({}):", cfg.feeds.len()));
    for (i, f) in cfg.feeds.iter().enumerate() {
        log.info(format!("  [{}] {} — {}", i + 1, f.label, f.url));
    }
    log.info(format!(
        "   keywords={} max_age={}d entries/feed={}",
        cfg.keywords.len(), cfg.filter.max_age_days, cfg.max_entries_per_feed
    ));
    if telemetry::config::json_mode() {
        let list = types::FeedList {
            feeds: &cfg.feeds,
            keywords: cfg.keywords.len(),
            max_entries_per_feed: cfg.max_entries_per_feed,
        };
        log.result(&list, None)?;
    }
    Ok(())
}
