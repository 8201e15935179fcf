//! Runner and ledger behaviour against an in-memory store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use integration_tests::fixtures::{at, run_options};
use integration_tests::mocks::{FakeStore, MemoryLedger, ScriptedMigration};
use migrate_core::{Error, MigrationId};
use migrations::{Ledger, Registry, RunOptions, Runner};

fn registry() -> Registry {
    Registry::new(vec![
        ScriptedMigration::new(1, "init", &["CREATE TABLE a (x UInt8) ENGINE = MergeTree ORDER BY x"]).boxed(),
        ScriptedMigration::new(2, "fill", &["INSERT INTO a SELECT 1", "INSERT INTO a SELECT 2"]).boxed(),
        ScriptedMigration::new(3, "rebuild", &["s1", "s2", "s3", "s4", "s5"]).boxed(),
    ])
    .unwrap()
}

fn runner(store: &FakeStore, ledger: &Arc<MemoryLedger>) -> Runner {
    Runner::new(registry(), ledger.clone(), Arc::new(store.clone()))
}

#[tokio::test]
async fn test_recorded_scripts_are_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FakeStore::new();
    let ledger = Arc::new(MemoryLedger::new());
    ledger.record("1-init", Utc::now()).await.unwrap();

    let report = runner(&store, &ledger)
        .run(&run_options(tmp.path(), at(2024, 3, 10, 0, 0, 0)))
        .await
        .unwrap();

    assert_eq!(report.skipped, vec![MigrationId::new(1, "init")]);
    assert_eq!(
        report.applied,
        vec![MigrationId::new(2, "fill"), MigrationId::new(3, "rebuild")]
    );
    assert_eq!(store.statements().len(), 7);
    assert!(!store.statements()[0].starts_with("CREATE TABLE a"));
    assert_eq!(ledger.names(), vec!["1-init", "2-fill", "3-rebuild"]);
}

#[tokio::test]
async fn test_second_run_executes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FakeStore::new();
    let ledger = Arc::new(MemoryLedger::new());
    let options = run_options(tmp.path(), at(2024, 3, 10, 0, 0, 0));

    runner(&store, &ledger).run(&options).await.unwrap();
    assert_eq!(store.statements().len(), 8);
    store.clear();

    let report = runner(&store, &ledger).run(&options).await.unwrap();

    assert!(report.applied.is_empty());
    assert_eq!(report.skipped.len(), 3);
    assert!(store.statements().is_empty());
    assert_eq!(ledger.records().len(), 3);
}

#[tokio::test]
async fn test_target_reruns_recorded_script() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FakeStore::new();
    let ledger = Arc::new(MemoryLedger::new());
    let recorded_at = Utc::now() - Duration::days(1);
    ledger.record("2-fill", recorded_at).await.unwrap();

    let report = runner(&store, &ledger)
        .run(&RunOptions {
            target: Some("2".into()),
            ..run_options(tmp.path(), at(2024, 3, 10, 0, 0, 0))
        })
        .await
        .unwrap();

    assert_eq!(report.applied, vec![MigrationId::new(2, "fill")]);
    assert!(report.skipped.is_empty());
    assert_eq!(
        store.statements(),
        vec!["INSERT INTO a SELECT 1", "INSERT INTO a SELECT 2"]
    );

    let records = ledger.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].created_at, recorded_at);
    assert!(records[0].updated_at > recorded_at);
}

#[tokio::test]
async fn test_failure_stops_without_record() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FakeStore::new();
    let ledger = Arc::new(MemoryLedger::new());
    ledger.record("1-init", Utc::now()).await.unwrap();
    ledger.record("2-fill", Utc::now()).await.unwrap();
    store.fail_at(2);

    let runner = runner(&store, &ledger);
    let err = runner
        .run(&run_options(tmp.path(), at(2024, 3, 10, 0, 0, 0)))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MigrationFailed { ref name, .. } if name == "3-rebuild"));
    assert_eq!(store.statements(), vec!["s1"]);
    assert_eq!(store.kills().len(), 1);
    assert_eq!(ledger.names(), vec!["1-init", "2-fill"]);
    assert_eq!(runner.metrics().scripts_failed.get(), 1);
    assert_eq!(runner.metrics().statements_failed.get(), 1);

    // The artifact is written before anything executes
    let artifact = std::fs::read_to_string(tmp.path().join("3-rebuild.sql")).unwrap();
    assert_eq!(artifact.matches("\n---\n").count(), 4);
}

#[tokio::test]
async fn test_unknown_target_runs_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FakeStore::new();
    let ledger = Arc::new(MemoryLedger::new());

    let err = runner(&store, &ledger)
        .run(&RunOptions {
            target: Some("7-missing".into()),
            ..run_options(tmp.path(), at(2024, 3, 10, 0, 0, 0))
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnknownMigration(ref t) if t == "7-missing"));
    assert!(store.statements().is_empty());
    assert!(ledger.records().is_empty());
}

#[tokio::test]
async fn test_plan_splits_registry() {
    let store = FakeStore::new();
    let ledger = Arc::new(MemoryLedger::new());
    ledger.record("1-init", Utc::now()).await.unwrap();
    ledger.record("not-a-script", Utc::now()).await.unwrap();

    let plan = runner(&store, &ledger).plan().await.unwrap();

    assert_eq!(plan.applied, vec![MigrationId::new(1, "init")]);
    assert_eq!(
        plan.pending,
        vec![MigrationId::new(2, "fill"), MigrationId::new(3, "rebuild")]
    );
}
