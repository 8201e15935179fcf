//! Session derivation end to end: migrate, seed events, derive, read back.

use chrono::{DateTime, Duration, Utc};
use clickhouse_client::sessions::fetch_sessions;
use clickhouse_client::SessionRecord;
use integration_tests::fixtures::{at, event, insert_events, run_options, EventFixture, PROJECT_ID};
use integration_tests::setup::TestContext;
use migrations::RunOptions;

/// Create the base tables, seed `rows`, then derive sessions for `start`'s day.
///
/// `None` when there is no ClickHouse to run against.
async fn derive(rows: &[EventFixture], start: DateTime<Utc>) -> Option<Vec<SessionRecord>> {
    let Some(ctx) = TestContext::try_new().await else {
        eprintln!("no Docker or MIGRATE_TEST_CLICKHOUSE_URL; skipping");
        return None;
    };
    let tmp = tempfile::tempdir().unwrap();

    ctx.migrate(
        tmp.path(),
        RunOptions {
            target: Some("1".into()),
            ..run_options(tmp.path(), start)
        },
    )
    .await
    .unwrap();

    ctx.execute(&insert_events(rows)).await.unwrap();

    let day = start.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
    ctx.migrate(
        tmp.path(),
        RunOptions {
            target: Some("2".into()),
            backfill_since: Some(day),
            ..run_options(tmp.path(), start + Duration::days(1))
        },
    )
    .await
    .unwrap();

    Some(fetch_sessions(&ctx.clickhouse, PROJECT_ID).await.unwrap())
}

#[tokio::test]
async fn test_single_page_session_is_bounce() {
    let t0 = at(2024, 3, 10, 12, 0, 0);
    let rows = vec![
        event("screen_view", "s1", t0).path("/pricing"),
        event("session_end", "s1", t0 + Duration::minutes(5))
            .path("/pricing")
            .duration(120_000),
    ];

    let Some(sessions) = derive(&rows, t0).await else {
        return;
    };

    assert_eq!(sessions.len(), 1);
    let session = &sessions[0];
    assert_eq!(session.id, "s1");
    assert_eq!(session.device_id, "device-1");
    assert_eq!(session.profile_id, "device-1");
    assert!(session.is_bounce);
    assert_eq!(session.screen_view_count, 1);
    assert_eq!(session.event_count, 0);
    assert_eq!(session.duration, 120_000);
    assert_eq!(session.created_at, t0.timestamp_millis());
    assert_eq!(session.ended_at, (t0 + Duration::minutes(5)).timestamp_millis());
    assert_eq!(session.exit_path, "/pricing");
    assert_eq!(session.sign, 1);
}

#[tokio::test]
async fn test_two_page_session_is_not_bounce() {
    let t0 = at(2024, 3, 10, 12, 0, 0);
    let rows = vec![
        event("screen_view", "s1", t0).path("/"),
        event("screen_view", "s1", t0 + Duration::minutes(1)).path("/docs"),
        event("signup", "s1", t0 + Duration::minutes(2)).path("/docs"),
        event("session_end", "s1", t0 + Duration::minutes(5))
            .path("/docs")
            .duration(120_000),
    ];

    let Some(sessions) = derive(&rows, t0).await else {
        return;
    };

    assert_eq!(sessions.len(), 1);
    let session = &sessions[0];
    assert!(!session.is_bounce);
    assert_eq!(session.screen_view_count, 2);
    assert_eq!(session.event_count, 1);
    assert_eq!(session.exit_path, "/docs");
}

#[tokio::test]
async fn test_explicit_bounce_flag_wins() {
    let t0 = at(2024, 3, 10, 12, 0, 0);
    let rows = vec![
        event("screen_view", "s1", t0),
        event("screen_view", "s1", t0 + Duration::minutes(1)),
        event("session_end", "s1", t0 + Duration::minutes(2)).property("__bounce", "true"),
    ];

    let Some(sessions) = derive(&rows, t0).await else {
        return;
    };

    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].is_bounce);
}

#[tokio::test]
async fn test_session_crossing_midnight_is_derived_once() {
    let t0 = at(2024, 3, 10, 23, 58, 0);
    let rows = vec![
        event("screen_view", "late", t0),
        event("screen_view", "late", t0 + Duration::minutes(4)),
        event("session_end", "late", t0 + Duration::minutes(5)).duration(300_000),
    ];

    let Some(sessions) = derive(&rows, t0).await else {
        return;
    };

    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].created_at, t0.timestamp_millis());
    assert_eq!(sessions[0].ended_at, (t0 + Duration::minutes(5)).timestamp_millis());
    assert_eq!(sessions[0].screen_view_count, 2);
}
