//! harvest: run a checkpointed harvest and optionally resolve target identities.
//!
//! Usage:
//!   harvest [config.yaml] [targets.json]
//!
//! Without a config path, defaults plus `HARVEST_*` environment variables are
//! used. When the final document of an earlier run exists and is incomplete,
//! the run resumes from it. Ctrl-C stops after the current page.

use anyhow::{bail, Context};
use resilient_harvest::matching::IdentityMatcher;
use resilient_harvest::pipeline::final_name;
use resilient_harvest::store::HarvestDocument;
use resilient_harvest::transport::ChallengeClient;
use resilient_harvest::{HarvestConfig, TargetIdentity};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn print_usage() {
    println!(
        r#"harvest {}

USAGE:
    harvest [CONFIG] [TARGETS]

ARGS:
    CONFIG      YAML harvest config (optional)
    TARGETS     JSON array of {{"id", "label"}} identities to resolve (optional)

ENVIRONMENT:
    HARVEST_PAGE_SIZE, HARVEST_MAX_PAGES, HARVEST_BREAKER_THRESHOLD,
    HARVEST_BREAKER_TIMEOUT_SECS, HARVEST_HTTP_TIMEOUT_SECS,
    HARVEST_OUTPUT_DIR, HARVEST_PROXY_URL, RUST_LOG"#,
        env!("CARGO_PKG_VERSION")
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args
        .first()
        .map(|a| matches!(a.as_str(), "-h" | "--help" | "help"))
        .unwrap_or(false)
    {
        print_usage();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match args.first() {
        Some(path) => HarvestConfig::from_path(path)
            .await
            .with_context(|| format!("loading config {}", path))?,
        None => HarvestConfig::default(),
    }
    .with_env_overrides()?;
    config.validate().context("invalid harvest config")?;
    let targets_path = args.get(1).map(PathBuf::from);

    let client = Arc::new(ChallengeClient::new(config.client_config())?);
    if let Some(probe) = &config.source.probe_url {
        if !client.test_connectivity(probe).await {
            bail!("connectivity probe to {} failed", probe);
        }
        info!(probe = %probe, "connectivity ok");
    }

    let store = Arc::new(config.open_store()?);
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after the current page");
                cancel.cancel();
            }
        });
    }

    let pipeline = config
        .pipeline_builder()
        .source(Arc::new(config.build_source(client)?))
        .store(store.clone())
        .cancellation_token(cancel)
        .build()?;

    let previous: Option<HarvestDocument> = store
        .read(&final_name(config.prefix()))
        .filter(|doc: &HarvestDocument| doc.source_id == config.source.id);
    let session = match previous {
        Some(doc) => pipeline.resume(doc, config.max_pages).await?,
        None => {
            pipeline
                .run(&config.source.id, config.page_size, config.max_pages)
                .await?
        }
    };

    println!(
        "{}: {} records over {} pages, {} requests, {} errors, {} circuit trips ({:?})",
        session.source_id,
        session.records.len(),
        session.stats.pages,
        session.stats.requests,
        session.stats.errors,
        session.stats.circuit_trips,
        session.completion,
    );
    if let Some(rate) = session.stats.success_rate() {
        println!("success rate: {:.1}%", rate);
    }

    let Some(path) = targets_path else {
        session.check_budget()?;
        return Ok(());
    };
    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading targets {}", path.display()))?;
    let targets: Vec<TargetIdentity> =
        serde_json::from_str(&raw).context("targets must be a JSON array of identities")?;

    let matcher = IdentityMatcher::new(&session.records);
    let report = matcher.resolve_all(&targets);
    let doc = report.to_document(&session.source_id);

    let prefix = config.prefix();
    let saved = store.write(&format!("{}-match-report.json", prefix), &doc)
        && store.write(&format!("{}-found.json", prefix), &doc.found)
        && store.write(&format!("{}-not-found.json", prefix), &doc.not_found);
    if !saved {
        warn!("match report not fully saved");
    }

    println!(
        "targets: {} found, {} not found",
        doc.found.len(),
        doc.not_found.len()
    );
    for entry in &doc.found {
        println!(
            "  {} -> {} ({}, {:.2})",
            entry.target.id,
            entry.record.display_id().unwrap_or("?"),
            entry.match_type,
            entry.confidence
        );
    }
    session.check_budget()?;
    Ok(())
}
