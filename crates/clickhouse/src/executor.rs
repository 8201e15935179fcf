//! Sequential statement execution with progress polling.
//!
//! Each statement runs tagged with a deterministic query id. While it runs a
//! second task polls `system.processes` for that id and logs progress. The
//! poller is stopped through its own [`CancelToken`] the moment the
//! statement resolves. On failure or interruption the statement is killed
//! on a best-effort basis and the error propagates.

use std::sync::Arc;
use std::time::{Duration, Instant};

use migrate_core::{Error, Result};
use sha2::{Digest, Sha256};
use telemetry::MigrationMetrics;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::ops::{log_progress, short_id};
use crate::store::Store;

/// Default interval between progress polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Hex SHA-256 of the statement text.
pub fn statement_id(sql: &str) -> String {
    hex::encode(Sha256::digest(sql.as_bytes()))
}

/// Runs statements one at a time against a [`Store`].
#[derive(Clone)]
pub struct Executor {
    store: Arc<dyn Store>,
    metrics: Arc<MigrationMetrics>,
    poll_interval: Duration,
    interrupt: CancelToken,
}

impl Executor {
    pub fn new(store: Arc<dyn Store>, metrics: Arc<MigrationMetrics>) -> Self {
        Self {
            store,
            metrics,
            poll_interval: DEFAULT_POLL_INTERVAL,
            interrupt: CancelToken::new(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Token that aborts the running statement when cancelled.
    pub fn with_interrupt(mut self, interrupt: CancelToken) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn interrupt(&self) -> &CancelToken {
        &self.interrupt
    }

    /// Execute `statements` in order, stopping at the first failure.
    pub async fn run(&self, statements: &[String]) -> Result<()> {
        for (index, sql) in statements.iter().enumerate() {
            debug!(
                statement = index + 1,
                total = statements.len(),
                "Executing statement"
            );
            self.execute_one(sql).await?;
        }
        Ok(())
    }

    async fn execute_one(&self, sql: &str) -> Result<()> {
        if let Some(reason) = self.interrupt.reason() {
            return Err(Error::Interrupted(reason));
        }

        let query_id = statement_id(sql);
        let started = Instant::now();

        let stop = CancelToken::new();
        let poller = tokio::spawn(poll_progress(
            Arc::clone(&self.store),
            Arc::clone(&self.metrics),
            query_id.clone(),
            self.poll_interval,
            stop.clone(),
        ));

        let result = tokio::select! {
            res = self.store.execute(sql, &query_id) => res,
            reason = self.interrupt.cancelled() => Err(Error::Interrupted(reason)),
        };

        stop.cancel("statement finished");
        if let Err(e) = poller.await {
            warn!(query_id = %short_id(&query_id), "Progress poller ended abnormally: {}", e);
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.metrics.statement_duration_ms.observe(elapsed_ms);

        match result {
            Ok(()) => {
                self.metrics.statements_executed.inc();
                info!(
                    query_id = %short_id(&query_id),
                    elapsed_ms,
                    "Statement finished"
                );
                Ok(())
            }
            Err(e) => {
                self.metrics.statements_failed.inc();
                self.kill(&query_id).await;
                error!(
                    query_id = %query_id,
                    elapsed_ms,
                    error = %e,
                    sql = %sql,
                    "Statement failed"
                );
                Err(e)
            }
        }
    }

    /// Best-effort kill; failures are logged and swallowed.
    async fn kill(&self, query_id: &str) {
        match self.store.kill(query_id).await {
            Ok(()) => {
                self.metrics.queries_killed.inc();
                warn!(query_id = %short_id(query_id), "Killed statement");
            }
            Err(e) => {
                self.metrics.kill_failures.inc();
                warn!(query_id = %short_id(query_id), "Failed to kill statement: {}", e);
            }
        }
    }
}

/// Poll progress for `query_id` until `stop` is cancelled.
async fn poll_progress(
    store: Arc<dyn Store>,
    metrics: Arc<MigrationMetrics>,
    query_id: String,
    every: Duration,
    stop: CancelToken,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                metrics.progress_polls.inc();
                match store.progress(&query_id).await {
                    Ok(Some(progress)) => log_progress(&query_id, &progress),
                    Ok(None) => debug!(query_id = %short_id(&query_id), "Statement not in process list"),
                    Err(e) => debug!(query_id = %short_id(&query_id), "Progress poll failed: {}", e),
                }
            }
        }
    }
}
