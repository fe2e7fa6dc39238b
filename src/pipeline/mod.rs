use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;

use crate::article::filter::FilterPolicy;
use crate::config::{DigestConfig, Secrets};
use crate::feeds::HttpFeedReader;
use crate::llm::{OpenAiClient, OpenAiClientConfig};
use crate::output::types::Meta;
use crate::store::NotionStore;
use crate::summarize::{Summarizer, UseCaseExtractor};
use crate::telemetry::{self};
use crate::util::time::parse_age_opt;

pub mod orchestrator;
pub mod report;

use orchestrator::{Pipeline, RunOptions};

/// digest run: fetch, filter, summarize and store one batch
#[derive(Args)]
pub struct RunCmd {
    /// JSON config file layered over the built-in defaults
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Fetch, filter and dedup without summarizing or writing
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
    /// Freshness window override, e.g. 7d or 36h
    #[arg(long)]
    pub max_age: Option<String>,
    /// Entries taken from the head of each feed
    #[arg(long)]
    pub limit: Option<usize>,
    /// Store raw excerpts instead of extracted use cases
    #[arg(long, default_value_t = false)]
    pub no_summarize: bool,
}

pub async fn run(args: RunCmd) -> Result<()> {
    let t0 = Instant::now();
    let log = telemetry::run();
    let _g = log.root_span_kv([
        ("dry_run", args.dry_run.to_string()),
        ("config", format!("{:?}", args.config)),
        ("max_age", format!("{:?}", args.max_age)),
        ("limit", format!("{:?}", args.limit)),
        ("no_summarize", args.no_summarize.to_string()),
    ]).entered();

    let mut cfg = DigestConfig::load(args.config.as_deref())?;
    if let Some(limit) = args.limit {
        cfg.max_entries_per_feed = limit;
    }
    if args.no_summarize {
        cfg.summarizer.enabled = false;
    }
    let summarize = cfg.summarizer.enabled && !args.dry_run;
    let secrets = Secrets::from_env(summarize)?;

    let mut filter = FilterPolicy::new(&cfg.filter, &cfg.keywords)?;
    if let Some(max_age) = parse_age_opt(&args.max_age)? {
        filter = filter.with_max_age(max_age);
    }

    let reader = HttpFeedReader::new(&cfg.fetch).context("build feed http client")?;
    let store = NotionStore::new(&cfg.notion, &secrets.notion_token, &secrets.notion_database_id)
        .context("build notion client")?;
    let extractor = if summarize {
        let client = OpenAiClient::new(OpenAiClientConfig::from_summarizer(
            &cfg.summarizer,
            secrets.openrouter_key.clone(),
        ))
        .context("build language model client")?;
        Some(UseCaseExtractor::new(client, &cfg.summarizer, &cfg.keywords))
    } else {
        log.info("ℹ️ Summarization off; storing raw excerpts");
        None
    };

    let mut pipeline = Pipeline::new(
        &reader,
        &filter,
        extractor.as_ref().map(|e| e as &dyn Summarizer),
        &store,
        RunOptions::from_config(&cfg, args.dry_run),
    );
    let report = pipeline.run(&cfg.feeds, Utc::now()).await?;

    if report.failed_feeds() > 0 {
        log.warn(format!("{} of {} feeds failed", report.failed_feeds(), report.feeds.len()));
    }

    if telemetry::config::json_mode() {
        let meta = Meta {
            duration_ms: Some(t0.elapsed().as_millis()),
            run_id: Some(report.run_id.to_string()),
        };
        if report.dry_run {
            log.plan(&report, Some(meta))?;
        } else {
            log.result(&report, Some(meta))?;
        }
    }
    Ok(())
}
