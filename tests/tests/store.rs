//! Store operations against a real ClickHouse.

use clickhouse_client::{statement_id, Store};
use integration_tests::setup::TestContext;

#[tokio::test]
async fn test_execute_and_health() {
    let Some(ctx) = TestContext::try_new().await else {
        eprintln!("no Docker or MIGRATE_TEST_CLICKHOUSE_URL; skipping");
        return;
    };

    assert!(clickhouse_client::health::check_connection(&ctx.clickhouse).await);

    let sql = "CREATE TABLE IF NOT EXISTS counters (x UInt8) ENGINE = MergeTree ORDER BY x";
    ctx.clickhouse.execute(sql, &statement_id(sql)).await.unwrap();
    ctx.execute("INSERT INTO counters VALUES (1), (2)").await.unwrap();

    let count: u64 = ctx
        .clickhouse
        .inner()
        .query("SELECT count() FROM counters")
        .fetch_one()
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_statement_with_question_mark() {
    let Some(ctx) = TestContext::try_new().await else {
        eprintln!("no Docker or MIGRATE_TEST_CLICKHOUSE_URL; skipping");
        return;
    };

    ctx.execute("CREATE TABLE IF NOT EXISTS notes (body String) ENGINE = MergeTree ORDER BY body")
        .await
        .unwrap();
    ctx.execute("INSERT INTO notes VALUES ('why?')").await.unwrap();

    // 'why?' survives as four characters rather than a bound parameter
    let length: u64 = ctx
        .clickhouse
        .inner()
        .query("SELECT length(body) FROM notes")
        .fetch_one()
        .await
        .unwrap();
    assert_eq!(length, 4);
}

#[tokio::test]
async fn test_unknown_query_id() {
    let Some(ctx) = TestContext::try_new().await else {
        eprintln!("no Docker or MIGRATE_TEST_CLICKHOUSE_URL; skipping");
        return;
    };
    let store = ctx.store();

    assert_eq!(store.progress("not-running").await.unwrap(), None);
    store.kill("not-running").await.unwrap();
}

#[tokio::test]
async fn test_failed_statement_is_store_error() {
    let Some(ctx) = TestContext::try_new().await else {
        eprintln!("no Docker or MIGRATE_TEST_CLICKHOUSE_URL; skipping");
        return;
    };

    let err = ctx.execute("SELECT * FROM missing_table").await.unwrap_err();
    assert_eq!(err.error_code(), Some("CH_001"));
}
