//! Query introspection against ClickHouse system tables.
//!
//! Used by the statement executor to:
//! - Report progress of a running statement from `system.processes`
//! - Kill a statement by its query id

use crate::client::ClickHouseClient;
use clickhouse::Row;
use migrate_core::{Error, Result, StoreErrorCode};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Progress of one running query from `system.processes`.
#[derive(Debug, Clone, Row, Deserialize, Serialize, PartialEq)]
pub struct QueryProgress {
    /// Seconds since the query started
    pub elapsed: f64,
    pub read_rows: u64,
    pub written_rows: u64,
    /// Bytes of memory in use (signed in the system table)
    pub memory_usage: i64,
}

/// Fetch progress for a query id; `None` once the query is no longer running.
pub async fn query_progress(
    client: &ClickHouseClient,
    query_id: &str,
) -> Result<Option<QueryProgress>> {
    let sql = r#"
        SELECT
            elapsed,
            read_rows,
            written_rows,
            memory_usage
        FROM system.processes
        WHERE query_id = ?
        LIMIT 1
    "#;

    client
        .inner()
        .query(sql)
        .bind(query_id)
        .fetch_optional::<QueryProgress>()
        .await
        .map_err(|e| Error::store(StoreErrorCode::ProgressFailed, format!("Query error: {}", e)))
}

/// Kill a running query by id.
pub async fn kill_query(client: &ClickHouseClient, query_id: &str) -> Result<()> {
    client
        .inner()
        .query("KILL QUERY WHERE query_id = ?")
        .bind(query_id)
        .execute()
        .await
        .map_err(|e| Error::store(StoreErrorCode::KillFailed, format!("Kill error: {}", e)))
}

/// Log one progress sample.
pub fn log_progress(query_id: &str, progress: &QueryProgress) {
    info!(
        query_id = %short_id(query_id),
        elapsed = format!("{:.2}s", progress.elapsed),
        read_rows = %format_count(progress.read_rows),
        written_rows = %format_count(progress.written_rows),
        memory = %format_bytes(progress.memory_usage.max(0) as u64),
        "Statement progress"
    );
}

/// First 12 hex characters of a statement id, for log lines.
pub fn short_id(query_id: &str) -> &str {
    query_id.get(..12).unwrap_or(query_id)
}

/// Format a row count with thousands separators.
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format bytes into human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
