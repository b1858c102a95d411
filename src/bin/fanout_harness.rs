//! Batch harness: dispatches a batch of queries against the mock providers
//! and prints a latency report.
//!
//! Usage: `tile-fanout-harness [config.toml]`
//!
//! Without an argument the per-user config file is read if present.
//!
//! The report goes to stdout as JSON; logs go to stderr.

use std::path::PathBuf;

use anyhow::Context;
use tile_fanout::diagnostics::init_tracing;
use tile_fanout::{BatchReport, EventHub, FanoutConfig, Providers, QueryDispatcher, write_report};

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(e) = run().await {
        tracing::error!(error = %e, "harness failed");
        eprintln!("tile-fanout-harness failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let explicit = std::env::args_os().nth(1).map(PathBuf::from);
    let config = FanoutConfig::load(explicit.as_deref()).with_context(|| match &explicit {
        Some(path) => format!("failed to load config from {}", path.display()),
        None => format!(
            "failed to load config from {}",
            FanoutConfig::default_config_path().display()
        ),
    })?;
    config.validate().context("invalid configuration")?;

    let (search, reviews, images) = tile_search::mock_providers(&config.mock)?;
    let dispatcher = QueryDispatcher::from_config(
        &config,
        Providers::new(search, reviews, images),
        EventHub::new(),
    )?;

    tracing::info!(
        queries = config.batch.size,
        downstream = config.pools.downstream_concurrency,
        dispatch = config.pools.dispatch_concurrency,
        "tile-fanout-harness starting"
    );
    let outcome = dispatcher.dispatch(config.batch.queries()).await?;
    let report = BatchReport::from_outcome(&outcome);

    println!("{}", report.to_json()?);
    if let Some(path) = &config.report_path {
        write_report(&report, path)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        tracing::info!(path = %path.display(), "saved batch report");
    }

    if !outcome.is_success() {
        anyhow::bail!("{} of {} queries failed", outcome.failed(), outcome.results.len());
    }
    Ok(())
}
