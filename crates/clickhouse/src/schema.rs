//! Analytics table and view definitions.
//!
//! Schema conventions:
//! - LowCardinality for enum-like fields
//! - DateTime64(3) for millisecond precision
//! - Map(String, String) for free-form event and profile properties
//! - Monthly partitions on the main time column

use crate::ddl::{column, ColumnDef, Engine, IndexDef, TableSpec, ViewSpec};

pub const EVENTS: &str = "events";
pub const EVENTS_BOTS: &str = "events_bots";
pub const PROFILES: &str = "profiles";
pub const PROFILE_ALIASES: &str = "profile_aliases";
pub const SESSIONS: &str = "sessions";
pub const SESSION_REPLAY_CHUNKS: &str = "session_replay_chunks";

pub const DAU_MV: &str = "dau_mv";
pub const COHORT_EVENTS_MV: &str = "cohort_events_mv";
pub const DISTINCT_EVENT_NAMES_MV: &str = "distinct_event_names_mv";
pub const EVENT_PROPERTY_VALUES_MV: &str = "event_property_values_mv";

const INDEX_GRANULARITY: &str = "8192";
const MONTHLY: &str = "toYYYYMM(created_at)";

/// Ordering key of `events` before and after the re-key.
pub const EVENTS_ORDER_V1: &[&str] = &["project_id", "toDate(created_at)", "profile_id", "name"];
pub const EVENTS_ORDER_V2: &[&str] = &["project_id", "toDate(created_at)", "name", "session_id"];

/// Ordering key of `sessions` before and after the re-key.
pub const SESSIONS_ORDER_V1: &[&str] = &["project_id", "id", "toDate(created_at)", "profile_id"];
pub const SESSIONS_ORDER_V2: &[&str] = &["project_id", "toDate(created_at)", "profile_id", "id"];

pub const EVENTS_HASH: &str = "cityHash64(project_id, toString(toStartOfHour(created_at)))";
pub const SESSIONS_HASH: &str = "cityHash64(id)";

/// UTM columns that lived on `events_bots` until they were narrowed away.
pub const BOT_UTM_COLUMNS: &[&str] = &[
    "utm_medium",
    "utm_source",
    "utm_campaign",
    "utm_content",
    "utm_term",
];

// =============================================================================
// Events
// =============================================================================

/// Columns shared by every layout of `events`.
pub fn event_columns() -> Vec<ColumnDef> {
    vec![
        column("id", "UUID").with_default("generateUUIDv4()"),
        column("name", "LowCardinality(String)"),
        column("sdk_name", "LowCardinality(String)"),
        column("sdk_version", "LowCardinality(String)"),
        column("device_id", "String").with_codec("ZSTD(3)"),
        column("profile_id", "String").with_codec("ZSTD(3)"),
        column("project_id", "String").with_codec("ZSTD(3)"),
        column("session_id", "String").with_codec("LZ4"),
        column("path", "String").with_codec("ZSTD(3)"),
        column("origin", "String").with_codec("ZSTD(3)"),
        column("referrer", "String").with_codec("ZSTD(3)"),
        column("referrer_name", "String").with_codec("ZSTD(3)"),
        column("referrer_type", "LowCardinality(String)"),
        column("duration", "UInt64").with_codec("Delta(4), LZ4"),
        column("properties", "Map(String, String)").with_codec("ZSTD(3)"),
        column("created_at", "DateTime64(3)").with_codec("DoubleDelta, ZSTD(3)"),
        column("country", "LowCardinality(FixedString(2))"),
        column("city", "String"),
        column("region", "LowCardinality(String)"),
        column("longitude", "Nullable(Float32)").with_codec("Gorilla, LZ4"),
        column("latitude", "Nullable(Float32)").with_codec("Gorilla, LZ4"),
        column("os", "LowCardinality(String)"),
        column("os_version", "LowCardinality(String)"),
        column("browser", "LowCardinality(String)"),
        column("browser_version", "LowCardinality(String)"),
        column("device", "LowCardinality(String)"),
        column("brand", "LowCardinality(String)"),
        column("model", "LowCardinality(String)"),
    ]
}

/// Columns added to `events` after the initial layout.
pub fn event_widened_columns() -> Vec<ColumnDef> {
    vec![
        column("imported_at", "Nullable(DateTime64(3))").with_codec("ZSTD(3)"),
        column("revenue", "UInt64").with_default("0"),
    ]
}

fn event_indices(spec: TableSpec) -> TableSpec {
    spec.index(IndexDef::new("idx_name", "name", "bloom_filter", 1))
        .index(IndexDef::new(
            "idx_properties_bounce",
            "properties['__bounce']",
            "set(3)",
            1,
        ))
        .index(IndexDef::new("idx_origin", "origin", "bloom_filter(0.05)", 1))
        .index(IndexDef::new("idx_path", "path", "bloom_filter(0.01)", 1))
}

/// `events` as first created.
pub fn events_table(is_clustered: bool) -> TableSpec {
    event_indices(TableSpec::new(EVENTS))
        .columns(event_columns())
        .partition_by(MONTHLY)
        .order_by(EVENTS_ORDER_V1.iter().copied())
        .setting("index_granularity", INDEX_GRANULARITY)
        .distribution_hash(EVENTS_HASH)
        .replicated_version(1)
        .clustered(is_clustered)
}

/// Re-keyed `events` layout, created under `name` and swapped into place.
pub fn events_rekeyed_table(name: &str, is_clustered: bool) -> TableSpec {
    event_indices(TableSpec::new(name))
        .columns(event_columns())
        .columns(event_widened_columns())
        .partition_by(MONTHLY)
        .order_by(EVENTS_ORDER_V2.iter().copied())
        .setting("index_granularity", INDEX_GRANULARITY)
        .distribution_hash(EVENTS_HASH)
        .replicated_version(2)
        .clustered(is_clustered)
}

/// Events classified as bot traffic. Kept narrow; never aggregated.
pub fn events_bots_table(is_clustered: bool) -> TableSpec {
    TableSpec::new(EVENTS_BOTS)
        .columns([
            column("id", "UUID").with_default("generateUUIDv4()"),
            column("project_id", "String"),
            column("name", "LowCardinality(String)"),
            column("type", "LowCardinality(String)"),
            column("path", "String"),
            column("created_at", "DateTime64(3)"),
        ])
        .columns(BOT_UTM_COLUMNS.iter().map(|c| column(c, "String")))
        .partition_by(MONTHLY)
        .order_by(["project_id", "created_at"])
        .setting("index_granularity", INDEX_GRANULARITY)
        .clustered(is_clustered)
}

// =============================================================================
// Profiles
// =============================================================================

pub fn profiles_table(is_clustered: bool) -> TableSpec {
    TableSpec::new(PROFILES)
        .columns([
            column("id", "String").with_codec("ZSTD(3)"),
            column("is_external", "Bool"),
            column("first_name", "String").with_codec("ZSTD(3)"),
            column("last_name", "String").with_codec("ZSTD(3)"),
            column("email", "String").with_codec("ZSTD(3)"),
            column("avatar", "String").with_codec("ZSTD(3)"),
            column("properties", "Map(String, String)").with_codec("ZSTD(3)"),
            column("project_id", "String").with_codec("ZSTD(3)"),
            column("created_at", "DateTime64(3)").with_codec("Delta, ZSTD(3)"),
        ])
        .index(IndexDef::new("idx_first_name", "first_name", "bloom_filter", 1))
        .index(IndexDef::new("idx_last_name", "last_name", "bloom_filter", 1))
        .index(IndexDef::new("idx_email", "email", "bloom_filter", 1))
        .engine(Engine::ReplacingMergeTree {
            version: Some("created_at".to_string()),
        })
        .order_by(["project_id", "id"])
        .setting("index_granularity", INDEX_GRANULARITY)
        // One profile id must always land on the same shard to be replaced
        .distribution_hash("cityHash64(project_id, id)")
        .clustered(is_clustered)
}

pub fn profile_aliases_table(is_clustered: bool) -> TableSpec {
    TableSpec::new(PROFILE_ALIASES)
        .columns([
            column("project_id", "String"),
            column("profile_id", "String"),
            column("alias", "String"),
            column("created_at", "DateTime"),
        ])
        .order_by(["project_id", "profile_id", "alias", "created_at"])
        .clustered(is_clustered)
}

// =============================================================================
// Sessions
// =============================================================================

/// Columns of `sessions` before `revenue` was added.
pub fn session_columns() -> Vec<ColumnDef> {
    let mut columns = vec![
        column("id", "String").with_codec("ZSTD(3)"),
        column("project_id", "String").with_codec("ZSTD(3)"),
        column("profile_id", "String").with_codec("ZSTD(3)"),
        column("device_id", "String").with_codec("ZSTD(3)"),
        column("created_at", "DateTime64(3)").with_codec("DoubleDelta, ZSTD(3)"),
        column("ended_at", "DateTime64(3)").with_codec("DoubleDelta, ZSTD(3)"),
        column("is_bounce", "Bool"),
        column("entry_origin", "LowCardinality(String)"),
        column("entry_path", "String").with_codec("ZSTD(3)"),
        column("exit_origin", "LowCardinality(String)"),
        column("exit_path", "String").with_codec("ZSTD(3)"),
        column("screen_view_count", "UInt32"),
        column("event_count", "UInt32"),
        column("duration", "UInt64"),
        column("country", "LowCardinality(FixedString(2))"),
        column("region", "LowCardinality(String)"),
        column("city", "String"),
        column("longitude", "Nullable(Float32)").with_codec("Gorilla, LZ4"),
        column("latitude", "Nullable(Float32)").with_codec("Gorilla, LZ4"),
        column("device", "LowCardinality(String)"),
        column("brand", "LowCardinality(String)"),
        column("model", "LowCardinality(String)"),
        column("browser", "LowCardinality(String)"),
        column("browser_version", "LowCardinality(String)"),
        column("os", "LowCardinality(String)"),
        column("os_version", "LowCardinality(String)"),
        column("referrer", "String").with_codec("ZSTD(3)"),
        column("referrer_name", "String").with_codec("ZSTD(3)"),
        column("referrer_type", "LowCardinality(String)"),
    ];
    columns.extend(
        migrate_core::events::properties::UTM
            .iter()
            .map(|(name, _)| column(name, "String").with_codec("ZSTD(3)")),
    );
    columns.push(column("sign", "Int8"));
    columns.push(column("version", "UInt64"));
    columns
}

/// Columns added to `sessions` after the initial layout.
pub fn session_widened_columns() -> Vec<ColumnDef> {
    vec![column("revenue", "UInt64").with_default("0")]
}

fn sessions_engine() -> Engine {
    Engine::VersionedCollapsingMergeTree {
        sign: "sign".to_string(),
        version: "version".to_string(),
    }
}

/// `sessions` as first created.
pub fn sessions_table(is_clustered: bool) -> TableSpec {
    TableSpec::new(SESSIONS)
        .columns(session_columns())
        .engine(sessions_engine())
        .partition_by(MONTHLY)
        .order_by(SESSIONS_ORDER_V1.iter().copied())
        .setting("index_granularity", INDEX_GRANULARITY)
        // Every emission of a session must collapse on the same shard
        .distribution_hash(SESSIONS_HASH)
        .replicated_version(1)
        .clustered(is_clustered)
}

/// Re-keyed `sessions` layout, created under `name` and swapped into place.
pub fn sessions_rekeyed_table(name: &str, is_clustered: bool) -> TableSpec {
    TableSpec::new(name)
        .columns(session_columns())
        .columns(session_widened_columns())
        .engine(sessions_engine())
        .partition_by(MONTHLY)
        .order_by(SESSIONS_ORDER_V2.iter().copied())
        .setting("index_granularity", INDEX_GRANULARITY)
        .distribution_hash(SESSIONS_HASH)
        .replicated_version(2)
        .clustered(is_clustered)
}

// =============================================================================
// Session replay
// =============================================================================

/// Recorded replay chunks, expired after 30 days.
pub fn session_replay_chunks_table(is_clustered: bool) -> TableSpec {
    TableSpec::new(SESSION_REPLAY_CHUNKS)
        .columns([
            column("project_id", "String").with_codec("ZSTD(3)"),
            column("session_id", "String").with_codec("ZSTD(3)"),
            column("chunk_index", "UInt16"),
            column("started_at", "DateTime64(3)").with_codec("DoubleDelta, ZSTD(3)"),
            column("ended_at", "DateTime64(3)").with_codec("DoubleDelta, ZSTD(3)"),
            column("events_count", "UInt16"),
            column("is_full_snapshot", "Bool"),
            column("payload", "String").with_codec("ZSTD(6)"),
        ])
        .partition_by("toYYYYMMDD(started_at)")
        .order_by(["project_id", "session_id", "chunk_index"])
        .ttl("toDateTime(started_at) + INTERVAL 30 DAY")
        .setting("index_granularity", INDEX_GRANULARITY)
        .setting("ttl_only_drop_parts", "1")
        .distribution_hash("cityHash64(session_id)")
        .clustered(is_clustered)
}

// =============================================================================
// Aggregate views
// =============================================================================

/// Daily active profiles per project.
pub fn dau_view(is_clustered: bool) -> ViewSpec {
    ViewSpec::new(
        DAU_MV,
        r#"
SELECT
    toDate(created_at) AS date,
    uniqState(profile_id) AS profiles,
    project_id
FROM {events}
GROUP BY date, project_id"#,
    )
    .source(EVENTS)
    .engine(Engine::AggregatingMergeTree)
    .partition_by("toYYYYMMDD(date)")
    .order_by(["project_id", "date"])
    .populate(true)
    .clustered(is_clustered)
}

/// Per-day event counts of identified profiles, for cohort retention.
pub fn cohort_events_view(is_clustered: bool) -> ViewSpec {
    ViewSpec::new(
        COHORT_EVENTS_MV,
        r#"
SELECT
    project_id,
    name,
    toDate(created_at) AS date,
    profile_id,
    count() AS event_count
FROM {events}
WHERE profile_id != device_id
GROUP BY project_id, name, date, profile_id"#,
    )
    .source(EVENTS)
    .engine(Engine::SummingMergeTree {
        columns: vec!["event_count".to_string()],
    })
    .order_by(["project_id", "name", "date", "profile_id"])
    .populate(true)
    .clustered(is_clustered)
}

/// Event names seen per project and day.
pub fn distinct_event_names_view(is_clustered: bool) -> ViewSpec {
    ViewSpec::new(
        DISTINCT_EVENT_NAMES_MV,
        r#"
SELECT
    project_id,
    name,
    toDate(created_at) AS date,
    count() AS event_count
FROM {events}
GROUP BY project_id, name, date"#,
    )
    .source(EVENTS)
    .engine(Engine::SummingMergeTree {
        columns: vec!["event_count".to_string()],
    })
    .order_by(["project_id", "name", "date"])
    .populate(true)
    .clustered(is_clustered)
}

/// Property values seen per event name, excluding internal `__` keys.
pub fn event_property_values_view(is_clustered: bool) -> ViewSpec {
    ViewSpec::new(
        EVENT_PROPERTY_VALUES_MV,
        r#"
SELECT
    project_id,
    name,
    property_key,
    property_value,
    max(created_at) AS last_seen
FROM {events}
ARRAY JOIN mapKeys(properties) AS property_key, mapValues(properties) AS property_value
WHERE property_value != '' AND NOT startsWith(property_key, '__')
GROUP BY project_id, name, property_key, property_value"#,
    )
    .source(EVENTS)
    .engine(Engine::ReplacingMergeTree {
        version: Some("last_seen".to_string()),
    })
    .order_by(["project_id", "name", "property_key", "property_value"])
    .populate(true)
    .clustered(is_clustered)
}

/// The four aggregate views over `events`.
pub fn aggregate_views(is_clustered: bool) -> Vec<ViewSpec> {
    vec![
        dau_view(is_clustered),
        cohort_events_view(is_clustered),
        distinct_event_names_view(is_clustered),
        event_property_values_view(is_clustered),
    ]
}
