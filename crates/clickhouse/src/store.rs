//! The store seam used by the statement executor.

use async_trait::async_trait;
use migrate_core::{Error, Result, StoreErrorCode};

use crate::client::{escape_placeholders, ClickHouseClient};
use crate::ops::{self, QueryProgress};

/// Operations the executor needs from the analytics store.
///
/// Implemented by [`ClickHouseClient`]; tests substitute an in-memory fake.
#[async_trait]
pub trait Store: Send + Sync {
    /// Run one statement tagged with `query_id` and wait for it to finish.
    async fn execute(&self, sql: &str, query_id: &str) -> Result<()>;

    /// Progress of a running statement, `None` if it is not running.
    async fn progress(&self, query_id: &str) -> Result<Option<QueryProgress>>;

    /// Kill a running statement.
    async fn kill(&self, query_id: &str) -> Result<()>;
}

#[async_trait]
impl Store for ClickHouseClient {
    async fn execute(&self, sql: &str, query_id: &str) -> Result<()> {
        self.tagged(query_id)
            .query(&escape_placeholders(sql))
            .execute()
            .await
            .map_err(|e| Error::store(StoreErrorCode::ExecuteFailed, e.to_string()))
    }

    async fn progress(&self, query_id: &str) -> Result<Option<QueryProgress>> {
        ops::query_progress(self, query_id).await
    }

    async fn kill(&self, query_id: &str) -> Result<()> {
        ops::kill_query(self, query_id).await
    }
}
