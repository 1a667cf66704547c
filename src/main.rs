use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use shopper_ingest::app::ingest_use_case::{IngestService, RunSummary};
use shopper_ingest::config::Config;
use shopper_ingest::constants::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use shopper_ingest::infra::Backends;
use shopper_ingest::logging;
use shopper_ingest::pipeline::steps::validate::{ValidationOutcome, Validator};
use shopper_ingest::schema::SchemaMapping;
use shopper_ingest::server;
use shopper_ingest::types::{Environment, StorageEvent};

#[derive(Parser)]
#[command(name = "shopper_ingest")]
#[command(about = "Shopper spreadsheet ingestion with a staging-gated production deploy")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration
    #[arg(long, global = true, env = CONFIG_PATH_ENV, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Target {
    Staging,
    Production,
}

impl From<Target> for Environment {
    fn from(target: Target) -> Self {
        match target {
            Target::Staging => Environment::Staging,
            Target::Production => Environment::Production,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Process one uploaded spreadsheet, as a storage notification would
    Ingest {
        /// Bucket the spreadsheet was uploaded to
        #[arg(long, requires = "name", conflicts_with = "event")]
        bucket: Option<String>,
        /// Object name of the uploaded spreadsheet
        #[arg(long, requires = "bucket")]
        name: Option<String>,
        /// JSON file holding the storage event
        #[arg(long)]
        event: Option<PathBuf>,
    },
    /// Probe a deploy target's warehouse table for at least one row
    Validate {
        #[arg(long, value_enum, default_value = "staging")]
        target: Target,
    },
    /// Accept storage events over HTTP
    Serve {
        #[arg(long, default_value = "8080")]
        port: u16,
    },
}

fn read_event(bucket: Option<String>, name: Option<String>, event: Option<PathBuf>) -> anyhow::Result<StorageEvent> {
    match (bucket, name, event) {
        (Some(bucket), Some(name), None) => Ok(StorageEvent::new(bucket, name)),
        (None, None, Some(path)) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading event file {}", path.display()))?;
            serde_json::from_str(&content).with_context(|| format!("parsing event file {}", path.display()))
        }
        _ => anyhow::bail!("pass either --bucket and --name, or --event"),
    }
}

fn print_summary(summary: &RunSummary) {
    println!("\n📊 Run {} for gs://{}/{}:", summary.run_id, summary.event.bucket, summary.event.name);
    println!("   Rows: {}", summary.rows);
    println!("   Cells nulled by normalization: {}", summary.normalization.total_nulled());
    println!(
        "   Cities matched: {} (unmatched: {})",
        summary.enrichment.matched, summary.enrichment.unmatched
    );
    println!("   Deploy stages: {:?}", summary.deploy.stages);
    if summary.promoted() {
        println!("✅ Promoted to production");
    } else {
        println!("⚠️  Staging was empty or errored; production left untouched");
    }
}

/// The column schema is only needed by commands that run the pipeline
fn ingest_service(config: Config, backends: Backends) -> anyhow::Result<IngestService> {
    let schema = SchemaMapping::load(&config.schema_path)
        .with_context(|| format!("loading column schema from {}", config.schema_path.display()))?;
    info!(columns = schema.len(), "Column schema loaded");
    Ok(IngestService::new(Arc::new(config), Arc::new(schema), backends))
}

async fn validate_target(config: &Config, backends: &Backends, target: Target) -> ValidationOutcome {
    let deploy_target = config.target(target.into());
    Validator::new(backends.warehouse.clone()).check(&deploy_target.table).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    let backends = Backends::from_config(&config)?;
    info!(config = %cli.config.display(), "Configuration loaded");

    match cli.command {
        Commands::Ingest { bucket, name, event } => {
            let event = read_event(bucket, name, event)?;
            println!("🔄 Ingesting gs://{}/{}...", event.bucket, event.name);
            let service = ingest_service(config, backends)?;
            match service.handle(&event).await {
                Ok(summary) => print_summary(&summary),
                Err(e) => {
                    println!("❌ Ingest failed: {e}");
                    return Err(e.into());
                }
            }
        }
        Commands::Validate { target } => {
            let table = config.target(target.into()).table;
            println!("🔎 Probing {table}...");
            match validate_target(&config, &backends, target).await {
                ValidationOutcome::Populated => println!("✅ {table} has rows"),
                ValidationOutcome::Empty => println!("⚠️  {table} is empty"),
                ValidationOutcome::Failed(message) => println!("❌ Query failed: {message}"),
            }
        }
        Commands::Serve { port } => {
            let service = ingest_service(config, backends)?;
            server::start_server(service, port).await?;
        }
    }

    Ok(())
}
