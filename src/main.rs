mod config;
mod github;
mod pipeline;
mod report;

use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{info, info_span, warn};
use tracing_subscriber::EnvFilter;

/// LGTM bot: approves open pull requests on the configured repositories
/// once they have enough peer approvals, skipping work in progress, blocked
/// pull requests and the bot's own.
#[derive(Parser, Debug)]
#[command(name = "lgtm-bot", version, about)]
struct Cli {
    /// Configuration file (defaults to .lgtm-bot.toml in the current directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run retrieval and filters, list what would be approved, submit nothing
    #[arg(long)]
    dry_run: bool,

    /// Append log output to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Optional output file path for a markdown run summary
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match &cli.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    let _main_span = info_span!("lgtm_run", dry_run = cli.dry_run).entered();

    info!("loading configuration");
    let config = config::Config::load(cli.config.as_deref())?;
    let repositories = config.repositories.len();

    let client = github::GitHubClient::from_config(&config)?;
    let mut pipeline = pipeline::ReviewPipeline::new(client, config);

    pipeline.retrieve().await?;
    let retrieved = pipeline.pull_requests().len();

    pipeline
        .filter_work_in_progress()
        .filter_do_not_merge()
        .filter_own_authored()
        .filter_sufficiently_reviewed()
        .await?;
    let candidates = pipeline.pull_requests().to_vec();
    info!(candidates = candidates.len(), "filtering complete");

    if cli.dry_run {
        let built_report = report::build_dry_run(repositories, retrieved, &candidates);
        report::output(&built_report, cli.output.as_deref())?;
        return Ok(());
    }

    let outcome = pipeline.approve_all().await;
    let built_report = report::build(repositories, retrieved, &candidates, &outcome);
    report::output(&built_report, cli.output.as_deref())?;
    if !outcome.is_success() {
        let failed: Vec<u64> = outcome
            .failed
            .iter()
            .map(|failure| failure.pull_request.number)
            .collect();
        warn!(?failed, "some approvals failed");
    }
    outcome.into_result()?;
    info!("done");

    Ok(())
}
