//! What a migration script sees while it runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use clickhouse_client::Executor;
use migrate_core::{Error, MigrationId, Result};
use telemetry::MigrationMetrics;
use tracing::info;

use crate::artifact;
use crate::backfill::DEFAULT_LOOKBACK_MONTHS;

/// Per-run settings shared by every script.
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    pub is_clustered: bool,
    pub dry: bool,
    pub artifact_dir: PathBuf,
    /// Anchor for default backfill ranges; fixed for the whole run
    pub now: DateTime<Utc>,
    /// Oldest data backfills and session derivation reach back to
    pub backfill_since: Option<DateTime<Utc>>,
}

/// Store access and run settings handed to each script.
#[derive(Clone)]
pub struct MigrationContext {
    executor: Executor,
    metrics: Arc<MigrationMetrics>,
    options: MigrationOptions,
}

impl MigrationContext {
    pub fn new(executor: Executor, metrics: Arc<MigrationMetrics>, options: MigrationOptions) -> Self {
        Self {
            executor,
            metrics,
            options,
        }
    }

    pub fn is_clustered(&self) -> bool {
        self.options.is_clustered
    }

    pub fn is_dry(&self) -> bool {
        self.options.dry
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.options.now
    }

    pub fn backfill_since(&self) -> Option<DateTime<Utc>> {
        self.options.backfill_since
    }

    /// Start of session derivation: `backfill_since`, or the default lookback before now.
    pub fn derivation_since(&self) -> Result<DateTime<Utc>> {
        match self.backfill_since() {
            Some(since) => Ok(since),
            None => self
                .now()
                .checked_sub_months(Months::new(DEFAULT_LOOKBACK_MONTHS))
                .ok_or_else(|| Error::backfill(format!("cannot look back from {}", self.now()))),
        }
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.options.artifact_dir
    }

    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    /// Persist the artifact for `id`, then execute unless dry.
    pub async fn apply(&self, id: MigrationId, statements: &[String]) -> Result<()> {
        let path = artifact::write(self.artifact_dir(), &id, statements).await?;
        self.metrics.artifacts_written.inc();

        info!(
            migration = %id,
            statements = statements.len(),
            artifact = %path.display(),
            "Rendered migration"
        );

        if self.is_dry() {
            info!(migration = %id, "Dry run, not executing");
            return Ok(());
        }

        self.executor.run(statements).await
    }
}
