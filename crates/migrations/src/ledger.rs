//! Completed-migration ledger in the relational metadata store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use migrate_core::{Error, LedgerErrorCode, LedgerRecord, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info};

/// Ledger table name.
pub const LEDGER_TABLE: &str = "code_migrations";

/// Where completed migrations are recorded.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// All recorded migrations.
    async fn applied(&self) -> Result<Vec<LedgerRecord>>;

    /// Upsert a completion record keyed by `name`.
    async fn record(&self, name: &str, at: DateTime<Utc>) -> Result<()>;
}

/// Postgres-backed ledger.
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and make sure the ledger table exists.
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("Connecting to ledger database...");
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(|e| Error::ledger(LedgerErrorCode::ReadFailed, format!("Connect error: {}", e)))?;

        let ledger = Self::new(pool);
        ledger.initialize().await?;
        Ok(ledger)
    }

    /// Create the ledger table if missing.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS code_migrations (
                name TEXT PRIMARY KEY,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::ledger(LedgerErrorCode::WriteFailed, format!("Init error: {}", e)))?;

        debug!(table = LEDGER_TABLE, "Ledger table ready");
        Ok(())
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn applied(&self) -> Result<Vec<LedgerRecord>> {
        let rows: Vec<(String, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT name, created_at, updated_at
            FROM code_migrations
            ORDER BY created_at, name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::ledger(LedgerErrorCode::ReadFailed, format!("Query error: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(name, created_at, updated_at)| LedgerRecord {
                name,
                created_at,
                updated_at,
            })
            .collect())
    }

    async fn record(&self, name: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO code_migrations (name, created_at, updated_at)
            VALUES ($1, $2, $2)
            ON CONFLICT (name) DO UPDATE SET updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(name)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::ledger(LedgerErrorCode::WriteFailed, format!("Upsert error: {}", e)))?;

        Ok(())
    }
}
