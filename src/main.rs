use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;

mod article;
mod config;
mod feeds;
mod llm;
mod output;
mod pipeline;
mod store;
mod summarize;
mod telemetry;
mod util;

#[derive(Parser)]
#[command(name = "digest", about = "AI-in-manufacturing use case digest: RSS feeds to Notion")]
struct Cli {
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Run(pipeline::RunCmd),
    Feeds(feeds::FeedsCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // initialize logging/tracing (stderr). Respect RUST_LOG and DIGEST_LOG_FORMAT
    telemetry::config::init_tracing();

    match cli.command {
        Commands::Run(args) => pipeline::run(args).await?,
        Commands::Feeds(args) => feeds::run(args)?,
    }

    Ok(())
}
