//! Common test setup functions.

use std::path::Path;
use std::sync::Arc;

use clickhouse_client::{ClickHouseClient, ClickHouseConfig, Store};
use migrate_core::Result;
use migrations::{Registry, RunOptions, RunReport, Runner};
use uuid::Uuid;

use crate::containers::{clickhouse_available, TestContainers};
use crate::mocks::MemoryLedger;

/// Test context with a real ClickHouse and an isolated database.
pub struct TestContext {
    pub containers: TestContainers,
    pub clickhouse: ClickHouseClient,
    pub database: String,
    pub ledger: Arc<MemoryLedger>,
}

impl TestContext {
    /// Like [`TestContext::new`], or `None` when there is no ClickHouse to run against.
    pub async fn try_new() -> Option<Self> {
        if !clickhouse_available() {
            return None;
        }
        Some(Self::new().await)
    }

    /// Start ClickHouse and create a database unique to this test.
    pub async fn new() -> Self {
        let containers = TestContainers::start().await;
        let database = format!("migrate_test_{}", Uuid::new_v4().simple());

        let admin = ClickHouseClient::new(client_config(&containers, "default"))
            .expect("Failed to create ClickHouse client");
        admin
            .execute(
                &format!("CREATE DATABASE IF NOT EXISTS {}", database),
                &Uuid::new_v4().to_string(),
            )
            .await
            .expect("Failed to create test database");

        let clickhouse = ClickHouseClient::new(client_config(&containers, &database))
            .expect("Failed to create ClickHouse client");

        Self {
            containers,
            clickhouse,
            database,
            ledger: Arc::new(MemoryLedger::new()),
        }
    }

    pub fn store(&self) -> Arc<dyn Store> {
        Arc::new(self.clickhouse.clone())
    }

    /// Run the shipped migrations against this database.
    pub async fn migrate(&self, artifact_dir: &Path, options: RunOptions) -> Result<RunReport> {
        let runner = Runner::new(Registry::builtin()?, self.ledger.clone(), self.store());
        runner
            .run(&RunOptions {
                artifact_dir: artifact_dir.to_path_buf(),
                ..options
            })
            .await
    }

    /// Execute one ad-hoc statement.
    pub async fn execute(&self, sql: &str) -> Result<()> {
        self.clickhouse.execute(sql, &Uuid::new_v4().to_string()).await
    }
}

fn client_config(containers: &TestContainers, database: &str) -> ClickHouseConfig {
    ClickHouseConfig {
        url: containers.clickhouse_url.clone(),
        database: database.to_string(),
        username: containers.clickhouse_username.clone(),
        password: containers.clickhouse_password.clone(),
        ..Default::default()
    }
}
