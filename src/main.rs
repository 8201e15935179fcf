//! Analytics store migration runner
//!
//! Applies the registered ClickHouse migrations in order:
//! - Topology-aware DDL for standalone and clustered deployments
//! - Windowed backfills when tables are rebuilt
//! - A ledger of completed scripts in the relational metadata store
//! - Dry runs that only render the SQL artifacts

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use clap::Parser;
use tracing::{error, info};

use clickhouse_client::{ClickHouseClient, ClickHouseConfig};
use migrations::runner::{DEFAULT_ARTIFACT_DIR, DEFAULT_STARTUP_DELAY};
use migrations::{PgLedger, Registry, RunOptions, Runner};
use telemetry::{init_tracing_from_env, MigrationMetrics};

/// Apply analytics store migrations.
#[derive(Parser)]
#[command(name = "migrate", version, about = "Apply analytics store migrations")]
struct Cli {
    /// Run only this migration (`3-widen-columns` or `3`), even if already applied
    #[arg(value_name = "MIGRATION")]
    target: Option<String>,

    /// Render SQL artifacts without executing or recording anything
    #[arg(long)]
    dry: bool,

    /// Generate clustered DDL (replicated tables behind distributed routers)
    #[arg(long)]
    cluster: bool,

    /// Directory for rendered `.sql` artifacts
    #[arg(long, value_name = "DIR")]
    artifact_dir: Option<PathBuf>,

    /// Oldest day backfills reach back to (YYYY-MM-DD, UTC)
    #[arg(long, value_name = "DATE")]
    since: Option<NaiveDate>,
}

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default)]
    clickhouse: ClickHouseConfig,

    /// Relational store holding the migration ledger
    #[serde(default)]
    database_url: Option<String>,

    /// Self-hosted deployments skip the startup delay
    #[serde(default)]
    self_hosted: bool,

    #[serde(default)]
    clustered: bool,

    #[serde(default = "default_artifact_dir")]
    artifact_dir: String,

    #[serde(default = "default_startup_delay_secs")]
    startup_delay_secs: u64,
}

fn default_artifact_dir() -> String {
    DEFAULT_ARTIFACT_DIR.to_string()
}

fn default_startup_delay_secs() -> u64 {
    DEFAULT_STARTUP_DELAY.as_secs()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clickhouse: ClickHouseConfig::default(),
            database_url: None,
            self_hosted: false,
            clustered: false,
            artifact_dir: default_artifact_dir(),
            startup_delay_secs: default_startup_delay_secs(),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Starting migration runner v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    let is_clustered = cli.cluster || config.clustered;

    let clickhouse = ClickHouseClient::new(config.clickhouse.clone())
        .context("Failed to create ClickHouse client")?;

    if !cli.dry && !clickhouse_client::health::check_connection(&clickhouse).await {
        bail!("ClickHouse is not reachable at {}", config.clickhouse.url);
    }

    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is required for the migration ledger")?;
    let ledger = PgLedger::connect(database_url)
        .await
        .context("Failed to open migration ledger")?;

    let registry = Registry::builtin().context("Invalid migration registry")?;
    let metrics = Arc::new(MigrationMetrics::new());
    let runner = Runner::new(registry, Arc::new(ledger), Arc::new(clickhouse))
        .with_metrics(Arc::clone(&metrics));

    let options = RunOptions {
        target: cli.target,
        dry: cli.dry,
        is_clustered,
        self_hosted: config.self_hosted,
        startup_delay: Duration::from_secs(config.startup_delay_secs),
        artifact_dir: cli
            .artifact_dir
            .unwrap_or_else(|| PathBuf::from(&config.artifact_dir)),
        poll_interval: Duration::from_secs(config.clickhouse.progress_interval_secs.max(1)),
        backfill_since: cli
            .since
            .map(|day| Utc.from_utc_datetime(&day.and_time(chrono::NaiveTime::MIN))),
        now: None,
        handle_signals: true,
    };

    info!(
        dry = options.dry,
        clustered = options.is_clustered,
        self_hosted = options.self_hosted,
        target = options.target.as_deref().unwrap_or("all"),
        artifact_dir = %options.artifact_dir.display(),
        "Loaded migration options"
    );

    let result = runner.run(&options).await;
    metrics.snapshot().log();

    let report = result.context("Migration run failed")?;
    info!(
        applied = report.applied.len(),
        skipped = report.skipped.len(),
        dry = report.dry,
        "Migrations finished"
    );

    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/migrate")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("MIGRATE")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Canonical deployment variables win over the layered config
    if let Ok(url) = std::env::var("CLICKHOUSE_URL") {
        config.clickhouse.url = url;
    }
    if let Ok(database) = std::env::var("CLICKHOUSE_DATABASE") {
        config.clickhouse.database = database;
    }
    if let Ok(username) = std::env::var("CLICKHOUSE_USER") {
        config.clickhouse.username = Some(username);
    }
    if let Ok(password) = std::env::var("CLICKHOUSE_PASSWORD") {
        config.clickhouse.password = Some(password);
    }
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database_url = Some(url);
    }
    if let Some(self_hosted) = env_flag("SELF_HOSTED") {
        config.self_hosted = self_hosted;
    }
    if let Some(clustered) = env_flag("CLICKHOUSE_CLUSTER") {
        config.clustered = clustered;
    }

    Ok(config)
}

/// `true`/`1` as true, anything else as false; `None` when unset.
fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1"))
}
