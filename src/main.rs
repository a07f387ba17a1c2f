use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use url::Url;

use searchads_cli::metrics;
use searchads_cli::{PolicyGate, SearchResultAdService, ServiceConfig, StaticMetadataSource};
use searchads_core_types::TabId;
use searchads_entities::{parse_web_page, AdRecord, WebPage};
use searchads_policy_center::{load_snapshot, PolicySnapshot};
use searchads_scheduler::{metrics as dispatch_metrics, LoggingReporter, QueueStatus};

#[derive(Parser)]
#[command(name = "searchads")]
#[command(about = "Search result ad ingestion and viewed-event dispatch")]
#[command(version)]
struct Cli {
    /// Policy file (yaml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a structured-data document and print the ads it carries
    Validate(ValidateArgs),

    /// Run a document through the full pipeline with a logging reporter
    Replay(ReplayArgs),

    /// Print the effective policy
    Policy(PolicyArgs),
}

#[derive(Args)]
struct ValidateArgs {
    /// JSON document to validate
    file: PathBuf,

    /// Fail when the document is rejected
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct ReplayArgs {
    /// JSON document served as the page's structured data
    #[arg(long, value_name = "FILE")]
    document: PathBuf,

    /// Committed page URL
    #[arg(long, default_value = "https://search.brave.com/search?q=replay")]
    url: String,

    /// Creative instance ids to request viewed events for, in order
    #[arg(long = "view", value_name = "ID")]
    views: Vec<String>,

    /// Issue the viewed requests before ingestion starts
    #[arg(long)]
    early: bool,

    /// Treat the page as one that should not trigger ingestion
    #[arg(long)]
    no_trigger: bool,

    /// Print prometheus metrics after the run
    #[arg(long)]
    metrics: bool,
}

#[derive(Args)]
struct PolicyArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ViewOutcome {
    creative_instance_id: String,
    triggered: Option<bool>,
    error: Option<String>,
}

#[derive(Serialize)]
struct ReplayReport {
    tab: String,
    ads_ingested: usize,
    views: Vec<ViewOutcome>,
    dispatched: u64,
    dispatch_failures: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.debug)?;

    let policy = load_policy(cli.config.as_deref())?;
    match cli.command {
        Commands::Validate(args) => cmd_validate(args),
        Commands::Replay(args) => cmd_replay(args, policy).await,
        Commands::Policy(args) => cmd_policy(args, &policy),
    }
}

fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

fn load_policy(path: Option<&Path>) -> Result<PolicySnapshot> {
    if let Some(path) = path {
        if !path.exists() {
            bail!("policy file not found: {}", path.display());
        }
    }
    let snapshot = load_snapshot(path).context("Failed to load policy")?;
    Ok(snapshot)
}

fn read_document(path: &Path) -> Result<WebPage> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse document {}", path.display()))
}

fn cmd_validate(args: ValidateArgs) -> Result<()> {
    let page = read_document(&args.file)?;
    let ads: BTreeMap<String, AdRecord> = match parse_web_page(&page) {
        Ok(ads) => ads.into_iter().collect(),
        Err(err) if args.strict => bail!("document rejected: {err}"),
        Err(err) => {
            warn!(error = %err, "document rejected");
            BTreeMap::new()
        }
    };
    println!("{}", serde_json::to_string_pretty(&ads)?);
    Ok(())
}

async fn cmd_replay(args: ReplayArgs, policy: PolicySnapshot) -> Result<()> {
    let page = read_document(&args.document)?;
    let url = Url::parse(&args.url).with_context(|| format!("Invalid url {}", args.url))?;
    metrics::register_metrics();

    let config = ServiceConfig::from(&policy.view());
    let source = Arc::new(StaticMetadataSource::new());
    let service = SearchResultAdService::new(
        source.clone(),
        Arc::new(LoggingReporter),
        Arc::new(PolicyGate::fixed(policy)),
        config,
    );

    let tab = TabId::new();
    source.insert(tab.clone(), page);
    info!(%tab, %url, "replaying search result ad document");

    let mut requests = Vec::new();
    if args.early {
        for id in &args.views {
            requests.push((id.clone(), service.request_viewed_event(tab.clone(), id)));
        }
    }
    service.maybe_ingest(tab.clone(), &url, !args.no_trigger).await;
    let ads_ingested = service.ad_count(&tab).unwrap_or(0);
    if !args.early {
        let _section = service.dispatch_section();
        for id in &args.views {
            requests.push((id.clone(), service.request_viewed_event(tab.clone(), id)));
        }
    }

    let mut views = Vec::new();
    for (creative_instance_id, request) in requests {
        let (triggered, error) = match request.await {
            Ok(triggered) => (Some(triggered), None),
            Err(err) => (None, Some(err.to_string())),
        };
        views.push(ViewOutcome {
            creative_instance_id,
            triggered,
            error,
        });
    }

    wait_for_idle_queue(&service).await;
    let counters = dispatch_metrics::snapshot();
    let report = ReplayReport {
        tab: tab.to_string(),
        ads_ingested,
        views,
        dispatched: counters.succeeded,
        dispatch_failures: counters.failed,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    if args.metrics {
        print!("{}", metrics::render_text());
    }
    Ok(())
}

async fn wait_for_idle_queue(service: &SearchResultAdService) {
    while service.queue_status() == QueueStatus::Dispatching {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn cmd_policy(args: PolicyArgs, snapshot: &PolicySnapshot) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
        return Ok(());
    }
    println!("Policy Revision: {}", snapshot.rev);
    println!();
    println!("Ads → enabled={}", snapshot.ads.enabled);
    println!(
        "Features → search_result_ad_confirmation_events={}",
        snapshot.features.search_result_ad_confirmation_events
    );
    println!("Hosts → {}", snapshot.hosts.allowed.join(", "));
    println!(
        "Timeouts → fetch_ms={}, report_ms={}",
        snapshot.ingest.fetch_timeout_ms, snapshot.dispatch.report_timeout_ms
    );
    let mut sources: Vec<_> = snapshot.provenance.values().collect();
    sources.sort_by(|a, b| a.path.cmp(&b.path));
    println!();
    for entry in sources {
        println!("  {} ← {:?}", entry.path, entry.source);
    }
    Ok(())
}
