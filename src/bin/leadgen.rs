//! leadgen CLI: operator interface to the enrichment and scan workflows.

use clap::{Args, Parser, Subcommand};
use leadgen_dispatch::config::Config;
use leadgen_dispatch::db::Db;
use leadgen_dispatch::dispatch::{BatchDispatcher, WebhookClient, WebhookKind};
use leadgen_dispatch::enrich::{self, enrich_places, score_businesses};
use leadgen_dispatch::model::ItemIds;
use leadgen_dispatch::scan::enqueue_scans;
use leadgen_dispatch::scanpoint::{self, GenerateRequest, generate_scanpoints, run_scanpoint};
use leadgen_dispatch::telemetry::{TelemetryConfig, init_telemetry};
use secrecy::ExposeSecret;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "leadgen", about = "Lead-generation workflow triggers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enrich selected businesses
    Enrich {
        #[command(subcommand)]
        action: EnrichAction,
    },
    /// Business scan queue operations
    Scans {
        #[command(subcommand)]
        action: ScanAction,
    },
    /// Scanpoint workflow triggers
    Scanpoints {
        #[command(subcommand)]
        action: ScanpointAction,
    },
}

/// Business ids given inline or as a JSON request body.
#[derive(Args)]
struct IdInput {
    /// Business ids
    ids: Vec<String>,
    /// Read a JSON request body (`{"business_ids": [...]}`) from a file, or `-` for stdin
    #[arg(long, conflicts_with = "ids")]
    json: Option<PathBuf>,
}

#[derive(Subcommand)]
enum EnrichAction {
    /// Trigger place enrichment for businesses with a place id
    Places {
        #[command(flatten)]
        input: IdInput,
    },
    /// Trigger AI scoring against an audience profile
    Score {
        /// Audience profile key forwarded with every business
        #[arg(long)]
        profile_key: Option<String>,
        #[command(flatten)]
        input: IdInput,
    },
}

#[derive(Subcommand)]
enum ScanAction {
    /// Queue scans, skipping businesses with one already active
    Enqueue {
        /// Requesting user id
        #[arg(long)]
        requested_by: Option<uuid::Uuid>,
        #[command(flatten)]
        input: IdInput,
    },
}

#[derive(Subcommand)]
enum ScanpointAction {
    /// Run one scanpoint, or the next pending one
    Run {
        /// Scanpoint id
        #[arg(long)]
        id: Option<String>,
    },
    /// Generate scanpoints around a location
    Generate {
        #[arg(long)]
        location: String,
        /// Radius in meters
        #[arg(long)]
        radius: Option<i64>,
        #[arg(long)]
        query: Option<String>,
        /// Place type
        #[arg(long = "type")]
        place_type: Option<String>,
        /// Seconds to wait before backfilling city
        #[arg(long, default_value_t = scanpoint::DEFAULT_SETTLE.as_secs())]
        settle_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    let _guard = init_telemetry(TelemetryConfig::from_config(&config, "leadgen"))?;

    match cli.command {
        Command::Enrich { action } => match action {
            EnrichAction::Places { input } => cmd_enrich_places(&config, input).await,
            EnrichAction::Score { profile_key, input } => {
                cmd_score(&config, profile_key, input).await
            }
        },
        Command::Scans {
            action: ScanAction::Enqueue {
                requested_by,
                input,
            },
        } => cmd_enqueue(&config, requested_by, input).await,
        Command::Scanpoints { action } => match action {
            ScanpointAction::Run { id } => cmd_scanpoint_run(&config, id).await,
            ScanpointAction::Generate {
                location,
                radius,
                query,
                place_type,
                settle_secs,
            } => {
                let request = GenerateRequest::new(
                    &location,
                    radius,
                    query.as_deref(),
                    place_type.as_deref(),
                )?;
                cmd_scanpoint_generate(&config, request, Duration::from_secs(settle_secs)).await
            }
        },
    }
}

async fn connect(config: &Config) -> anyhow::Result<Db> {
    let db = Db::connect(config.require_database_url()?.expose_secret()).await?;
    Ok(db)
}

fn read_body(path: &Path) -> anyhow::Result<serde_json::Value> {
    let mut raw = String::new();
    if path.as_os_str() == "-" {
        std::io::stdin().read_to_string(&mut raw)?;
    } else {
        raw = std::fs::read_to_string(path)?;
    }
    Ok(serde_json::from_str(&raw)?)
}

fn read_ids(input: &IdInput) -> anyhow::Result<(ItemIds, Option<serde_json::Value>)> {
    match input.json {
        Some(ref path) => {
            let body = read_body(path)?;
            Ok((enrich::parse_business_ids(&body)?, Some(body)))
        }
        None => Ok((ItemIds::new(&input.ids), None)),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn cmd_enrich_places(config: &Config, input: IdInput) -> anyhow::Result<()> {
    let dispatcher = BatchDispatcher::from_config(config, WebhookKind::PlaceEnrich)?;
    let (ids, _) = read_ids(&input)?;
    let report = if ids.is_empty() {
        enrich::EnrichReport::default()
    } else {
        let db = connect(config).await?;
        enrich_places(&db, &dispatcher, &ids).await?
    };
    print_json(&report)
}

async fn cmd_score(
    config: &Config,
    profile_key: Option<String>,
    input: IdInput,
) -> anyhow::Result<()> {
    let dispatcher = BatchDispatcher::from_config(config, WebhookKind::AiScore)?;
    let (ids, body) = read_ids(&input)?;
    let profile_key = match (profile_key, body) {
        (Some(key), _) => key,
        (None, Some(body)) => enrich::parse_profile_key(&body)?,
        (None, None) => String::new(),
    };

    let report = score_businesses(&dispatcher, &ids, &profile_key).await?;
    print_json(&report)?;
    if let Some(summary) = report.failure_summary() {
        anyhow::bail!(summary);
    }
    Ok(())
}

async fn cmd_enqueue(
    config: &Config,
    requested_by: Option<uuid::Uuid>,
    input: IdInput,
) -> anyhow::Result<()> {
    let (ids, _) = read_ids(&input)?;
    let db = connect(config).await?;
    let report = enqueue_scans(&db, &ids, requested_by).await?;
    print_json(&report)
}

async fn cmd_scanpoint_run(config: &Config, id: Option<String>) -> anyhow::Result<()> {
    let client = WebhookClient::new(config.webhook(WebhookKind::ScanpointRun)?.clone());
    let response = run_scanpoint(&client, id.as_deref()).await?;
    print_json(&response)
}

async fn cmd_scanpoint_generate(
    config: &Config,
    request: GenerateRequest,
    settle: Duration,
) -> anyhow::Result<()> {
    let client = WebhookClient::new(config.webhook(WebhookKind::ScanpointGenerate)?.clone());
    let db = connect(config).await?;
    let report = generate_scanpoints(&client, &db, &request, settle).await?;
    print_json(&report)
}
