//! Mock implementations for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickhouse_client::{QueryProgress, Store};
use migrate_core::{Error, LedgerRecord, Result, StoreErrorCode};
use migrations::{Ledger, Migration, MigrationContext};
use parking_lot::Mutex;
use std::sync::Arc;

/// Store that records statements in memory.
///
/// Implements the same `Store` trait as the ClickHouse client, so the
/// executor and runner run their real code paths against it.
#[derive(Clone, Default)]
pub struct FakeStore {
    statements: Arc<Mutex<Vec<String>>>,
    kills: Arc<Mutex<Vec<String>>>,
    calls: Arc<Mutex<usize>>,
    /// 1-based `execute` call that fails
    fail_at: Arc<Mutex<Option<usize>>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`th `execute` call (1-based) from now on.
    pub fn fail_at(&self, n: usize) {
        *self.fail_at.lock() = Some(n);
    }

    /// Statements that executed successfully.
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }

    /// Query ids passed to `kill`.
    pub fn kills(&self) -> Vec<String> {
        self.kills.lock().clone()
    }

    pub fn clear(&self) {
        self.statements.lock().clear();
        self.kills.lock().clear();
        *self.calls.lock() = 0;
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn execute(&self, sql: &str, _query_id: &str) -> Result<()> {
        let call = {
            let mut calls = self.calls.lock();
            *calls += 1;
            *calls
        };

        if *self.fail_at.lock() == Some(call) {
            return Err(Error::store(
                StoreErrorCode::ExecuteFailed,
                format!("Mock store failure on call {}", call),
            ));
        }

        self.statements.lock().push(sql.to_string());
        Ok(())
    }

    async fn progress(&self, _query_id: &str) -> Result<Option<QueryProgress>> {
        Ok(None)
    }

    async fn kill(&self, query_id: &str) -> Result<()> {
        self.kills.lock().push(query_id.to_string());
        Ok(())
    }
}

/// Ledger kept in memory with the same upsert-by-name semantics as Postgres.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    records: Arc<Mutex<Vec<LedgerRecord>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LedgerRecord> {
        self.records.lock().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.name.clone()).collect()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn applied(&self) -> Result<Vec<LedgerRecord>> {
        Ok(self.records())
    }

    async fn record(&self, name: &str, at: DateTime<Utc>) -> Result<()> {
        let mut records = self.records.lock();
        match records.iter_mut().find(|r| r.name == name) {
            Some(existing) => existing.updated_at = at,
            None => records.push(LedgerRecord::new(name, at)),
        }
        Ok(())
    }
}

/// Migration that plans a fixed list of statements.
pub struct ScriptedMigration {
    id: migrate_core::MigrationId,
    statements: Vec<String>,
}

impl ScriptedMigration {
    pub fn new(version: u32, name: &'static str, statements: &[&str]) -> Self {
        Self {
            id: migrate_core::MigrationId::new(version, name),
            statements: statements.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn boxed(self) -> Box<dyn Migration> {
        Box::new(self)
    }
}

impl Migration for ScriptedMigration {
    fn id(&self) -> migrate_core::MigrationId {
        self.id
    }

    fn plan(&self, _ctx: &MigrationContext) -> Result<Vec<String>> {
        Ok(self.statements.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_store_fails_on_requested_call() {
        let store = FakeStore::new();
        store.fail_at(2);

        assert!(store.execute("a", "id-a").await.is_ok());
        assert!(store.execute("b", "id-b").await.is_err());
        assert!(store.execute("c", "id-c").await.is_ok());
        assert_eq!(store.statements(), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_memory_ledger_upserts() {
        let ledger = MemoryLedger::new();
        let first = Utc::now();
        let later = first + chrono::Duration::seconds(5);

        ledger.record("1-init-ch", first).await.unwrap();
        ledger.record("1-init-ch", later).await.unwrap();

        let records = ledger.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].created_at, first);
        assert_eq!(records[0].updated_at, later);
    }
}
