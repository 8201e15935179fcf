//! Dry runs of the shipped migrations against an in-memory store.

use std::path::Path;
use std::sync::Arc;

use clickhouse_client::schema;
use integration_tests::fixtures::{at, run_options};
use integration_tests::mocks::{FakeStore, MemoryLedger};
use migrations::artifact::STATEMENT_SEPARATOR;
use migrations::{Registry, RunOptions, Runner};

fn runner(store: &FakeStore, ledger: &Arc<MemoryLedger>) -> Runner {
    Runner::new(Registry::builtin().unwrap(), ledger.clone(), Arc::new(store.clone()))
}

fn artifacts(dir: &Path) -> Vec<(String, String)> {
    let mut files: Vec<(String, String)> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let path = entry.unwrap().path();
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            (name, std::fs::read_to_string(&path).unwrap())
        })
        .collect();
    files.sort();
    files
}

#[tokio::test]
async fn test_dry_run_writes_every_artifact() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FakeStore::new();
    let ledger = Arc::new(MemoryLedger::new());

    let report = runner(&store, &ledger)
        .run(&RunOptions {
            dry: true,
            ..run_options(tmp.path(), at(2024, 3, 10, 0, 0, 0))
        })
        .await
        .unwrap();

    assert!(report.dry);
    assert_eq!(report.applied.len(), 5);
    assert!(store.statements().is_empty());
    assert!(ledger.records().is_empty());

    let names: Vec<String> = artifacts(tmp.path()).into_iter().map(|(n, _)| n).collect();
    assert_eq!(
        names,
        vec![
            "1-init-ch.sql",
            "2-add-sessions.sql",
            "3-widen-columns.sql",
            "4-order-keys.sql",
            "5-session-replay.sql",
        ]
    );
}

#[tokio::test]
async fn test_dry_and_real_artifacts_match() {
    let dry_dir = tempfile::tempdir().unwrap();
    let real_dir = tempfile::tempdir().unwrap();
    let now = at(2024, 3, 10, 0, 0, 0);

    let dry_store = FakeStore::new();
    runner(&dry_store, &Arc::new(MemoryLedger::new()))
        .run(&RunOptions {
            dry: true,
            ..run_options(dry_dir.path(), now)
        })
        .await
        .unwrap();

    let store = FakeStore::new();
    let ledger = Arc::new(MemoryLedger::new());
    runner(&store, &ledger)
        .run(&run_options(real_dir.path(), now))
        .await
        .unwrap();

    let dry = artifacts(dry_dir.path());
    let real = artifacts(real_dir.path());
    assert_eq!(dry, real);

    // One executed statement per artifact entry
    let rendered: usize = real
        .iter()
        .map(|(_, body)| body.matches(STATEMENT_SEPARATOR).count() + 1)
        .sum();
    assert_eq!(store.statements().len(), rendered);
    assert_eq!(ledger.records().len(), 5);
}

#[tokio::test]
async fn test_standalone_artifacts_have_no_cluster_clauses() {
    let tmp = tempfile::tempdir().unwrap();

    runner(&FakeStore::new(), &Arc::new(MemoryLedger::new()))
        .run(&RunOptions {
            dry: true,
            ..run_options(tmp.path(), at(2024, 3, 10, 0, 0, 0))
        })
        .await
        .unwrap();

    for (name, body) in artifacts(tmp.path()) {
        assert!(!body.contains("ON CLUSTER"), "{} has ON CLUSTER", name);
        assert!(!body.contains("_replicated"), "{} references replicated tables", name);
    }
}

#[tokio::test]
async fn test_clustered_dry_run() {
    let tmp = tempfile::tempdir().unwrap();

    runner(&FakeStore::new(), &Arc::new(MemoryLedger::new()))
        .run(&RunOptions {
            dry: true,
            is_clustered: true,
            ..run_options(tmp.path(), at(2024, 3, 10, 0, 0, 0))
        })
        .await
        .unwrap();

    let files = artifacts(tmp.path());
    let init = &files[0].1;
    assert!(init.contains("CREATE TABLE IF NOT EXISTS events_replicated ON CLUSTER '{cluster}'"));
    assert!(init.contains("ENGINE = Distributed('{cluster}', currentDatabase(), events_replicated"));

    let order_keys = &files[3].1;
    assert!(order_keys.contains("RENAME TABLE events_replicated TO events_old_replicated ON CLUSTER '{cluster}'"));
    assert!(order_keys.contains("/analytics/v2/{table}"));
}

async fn standalone_order_keys() -> String {
    let tmp = tempfile::tempdir().unwrap();

    runner(&FakeStore::new(), &Arc::new(MemoryLedger::new()))
        .run(&RunOptions {
            dry: true,
            ..run_options(tmp.path(), at(2024, 3, 10, 0, 0, 0))
        })
        .await
        .unwrap();

    artifacts(tmp.path())
        .into_iter()
        .find(|(name, _)| name == "4-order-keys.sql")
        .map(|(_, body)| body)
        .unwrap()
}

#[tokio::test]
async fn test_order_keys_rebuilds_every_view() {
    let body = standalone_order_keys().await;
    let swapped = body.find("RENAME TABLE events_new TO events").unwrap();

    for view in [
        schema::DAU_MV,
        schema::COHORT_EVENTS_MV,
        schema::DISTINCT_EVENT_NAMES_MV,
        schema::EVENT_PROPERTY_VALUES_MV,
    ] {
        let dropped = body
            .find(&format!("DROP TABLE IF EXISTS {}", view))
            .unwrap_or_else(|| panic!("{} not dropped", view));
        let created = body
            .find(&format!("CREATE MATERIALIZED VIEW IF NOT EXISTS {}\n", view))
            .unwrap_or_else(|| panic!("{} not re-created", view));

        assert!(swapped < dropped, "{} dropped before the swap", view);
        assert!(dropped < created, "{} created before it was dropped", view);
    }
}

#[tokio::test]
async fn test_order_keys_derives_sessions_with_revenue() {
    let body = standalone_order_keys().await;

    // backfill_since is two days before now: one derivation per day
    assert_eq!(body.matches("INSERT INTO sessions_new (").count(), 3);
    assert!(!body.contains("FROM sessions WHERE"));

    let derived = body.find("sumIf(e.revenue, e.name = 'revenue')").unwrap();
    let events_swapped = body.find("RENAME TABLE events_new TO events").unwrap();
    let sessions_swapped = body.find("RENAME TABLE sessions_new TO sessions").unwrap();
    assert!(events_swapped < derived);
    assert!(derived < sessions_swapped);
}
