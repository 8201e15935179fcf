//! Runs registered migrations against the store and records them in the ledger.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clickhouse_client::{CancelToken, Executor, SignalGuard, Store, DEFAULT_POLL_INTERVAL};
use migrate_core::{Error, MigrationId, Result};
use telemetry::MigrationMetrics;
use tracing::{error, info, warn};

use crate::context::{MigrationContext, MigrationOptions};
use crate::ledger::Ledger;
use crate::migration::Migration;
use crate::registry::Registry;

/// Default pause before a managed full run.
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(10);

/// Default directory for rendered SQL artifacts.
pub const DEFAULT_ARTIFACT_DIR: &str = "migrations/sql";

/// Options for one runner invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Run only this script, regardless of the ledger
    pub target: Option<String>,
    /// Render artifacts only; no statements, no ledger writes
    pub dry: bool,
    pub is_clustered: bool,
    /// Self-hosted deployments skip the startup delay
    pub self_hosted: bool,
    pub startup_delay: Duration,
    pub artifact_dir: PathBuf,
    pub poll_interval: Duration,
    pub backfill_since: Option<DateTime<Utc>>,
    /// Fixed clock for the run; the current time when absent
    pub now: Option<DateTime<Utc>>,
    /// Abort the running statement on SIGINT/SIGTERM
    pub handle_signals: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            target: None,
            dry: false,
            is_clustered: false,
            self_hosted: true,
            startup_delay: DEFAULT_STARTUP_DELAY,
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            poll_interval: DEFAULT_POLL_INTERVAL,
            backfill_since: None,
            now: None,
            handle_signals: true,
        }
    }
}

/// Registry cross-referenced with the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub applied: Vec<MigrationId>,
    pub pending: Vec<MigrationId>,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub applied: Vec<MigrationId>,
    pub skipped: Vec<MigrationId>,
    pub dry: bool,
}

/// Walks the registry in order, executing and recording each script.
pub struct Runner {
    registry: Registry,
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn Store>,
    metrics: Arc<MigrationMetrics>,
    interrupt: CancelToken,
}

impl Runner {
    pub fn new(registry: Registry, ledger: Arc<dyn Ledger>, store: Arc<dyn Store>) -> Self {
        Self {
            registry,
            ledger,
            store,
            metrics: Arc::new(MigrationMetrics::new()),
            interrupt: CancelToken::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MigrationMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<MigrationMetrics> {
        &self.metrics
    }

    /// Cancelling this token interrupts the run.
    pub fn interrupt(&self) -> &CancelToken {
        &self.interrupt
    }

    /// Split the registry into applied and pending scripts.
    pub async fn plan(&self) -> Result<Plan> {
        let recorded: HashSet<String> = self
            .ledger
            .applied()
            .await?
            .into_iter()
            .map(|r| r.name)
            .collect();

        let (applied, pending): (Vec<_>, Vec<_>) = self
            .registry
            .ids()
            .into_iter()
            .partition(|id| recorded.contains(&id.key()));

        info!(
            applied = ?applied.iter().map(MigrationId::key).collect::<Vec<_>>(),
            pending = ?pending.iter().map(MigrationId::key).collect::<Vec<_>>(),
            "Migration plan"
        );

        Ok(Plan { applied, pending })
    }

    /// Run one targeted script or every pending script.
    pub async fn run(&self, options: &RunOptions) -> Result<RunReport> {
        let now = options.now.unwrap_or_else(Utc::now);
        let _signals = options
            .handle_signals
            .then(|| SignalGuard::install(self.interrupt.clone()));

        let mut report = RunReport {
            dry: options.dry,
            ..Default::default()
        };

        let selected: Vec<&dyn Migration> = match options.target {
            Some(ref target) => {
                let script = self.registry.find(target)?;
                info!(
                    migration = %script.id(),
                    "Running single migration regardless of ledger"
                );
                vec![script]
            }
            None => {
                let plan = self.plan().await?;
                self.metrics.scripts_skipped.inc_by(plan.applied.len() as u64);
                report.skipped = plan.applied;
                self.registry
                    .scripts()
                    .filter(|s| plan.pending.contains(&s.id()))
                    .collect()
            }
        };

        if selected.is_empty() {
            info!("No pending migrations");
            return Ok(report);
        }

        if options.target.is_none() && !options.dry && !options.self_hosted {
            self.startup_delay(options.startup_delay).await?;
        }

        let executor = Executor::new(Arc::clone(&self.store), Arc::clone(&self.metrics))
            .with_poll_interval(options.poll_interval)
            .with_interrupt(self.interrupt.clone());
        let ctx = MigrationContext::new(
            executor,
            Arc::clone(&self.metrics),
            MigrationOptions {
                is_clustered: options.is_clustered,
                dry: options.dry,
                artifact_dir: options.artifact_dir.clone(),
                now,
                backfill_since: options.backfill_since,
            },
        );

        for script in selected {
            let id = script.id();
            info!(migration = %id, dry = options.dry, clustered = options.is_clustered, "Running migration");

            if let Err(e) = self.apply(script, &ctx).await {
                self.metrics.scripts_failed.inc();
                error!(
                    migration = %id,
                    code = e.error_code().unwrap_or("-"),
                    interrupted = e.is_interrupted(),
                    error = %e,
                    "Migration failed"
                );
                return Err(Error::migration_failed(id.key(), e));
            }

            self.metrics.scripts_applied.inc();
            report.applied.push(id);
            info!(migration = %id, "Migration complete");
        }

        Ok(report)
    }

    /// Run one script and record it unless dry.
    async fn apply(&self, script: &dyn Migration, ctx: &MigrationContext) -> Result<()> {
        script.up(ctx).await?;

        if !ctx.is_dry() {
            self.ledger.record(&script.id().key(), Utc::now()).await?;
        }
        Ok(())
    }

    async fn startup_delay(&self, delay: Duration) -> Result<()> {
        if delay.is_zero() {
            return Ok(());
        }

        warn!(
            delay_secs = delay.as_secs(),
            "Managed deployment, waiting before running migrations"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            reason = self.interrupt.cancelled() => Err(Error::Interrupted(reason)),
        }
    }
}
