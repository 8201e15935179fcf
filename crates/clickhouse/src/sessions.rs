//! Session reconstruction from raw events.
//!
//! Sessions are rebuilt one UTC day at a time. The statement for day `D`
//! scans events in `[D, D+4d)` so sessions that started late on `D` are seen
//! whole, and keeps only sessions whose first event falls in `[D, D+1d)` so
//! no session is emitted by two days.

use chrono::{Days, NaiveDate};
use clickhouse::Row;
use migrate_core::events::{names, properties};
use migrate_core::{literal, Error, Ident, Result, StoreErrorCode};
use serde::Deserialize;

use crate::client::ClickHouseClient;
use crate::schema::{EVENTS, SESSIONS};

/// Days after the start day scanned for the tail of a session.
pub const TRAILING_DAYS: u64 = 3;

/// Builds the `INSERT ... SELECT` statements deriving sessions from events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivation {
    pub events: String,
    pub sessions: String,
    /// Sum `revenue` events into the session; needs the column on both tables
    pub with_revenue: bool,
}

impl Default for Derivation {
    fn default() -> Self {
        Self {
            events: EVENTS.to_string(),
            sessions: SESSIONS.to_string(),
            with_revenue: false,
        }
    }
}

fn pinned(expr: &str) -> String {
    format!(
        "argMinIf({}, e.created_at, e.name = {})",
        expr,
        literal(names::SESSION_START)
    )
}

fn in_list(values: &[&str]) -> String {
    values.iter().map(|v| literal(v)).collect::<Vec<_>>().join(", ")
}

fn day_start(day: NaiveDate) -> String {
    format!(
        "toDateTime64({}, 3, 'UTC')",
        literal(&day.format("%Y-%m-%d 00:00:00").to_string())
    )
}

fn add_days(day: NaiveDate, n: u64) -> Result<NaiveDate> {
    day.checked_add_days(Days::new(n))
        .ok_or_else(|| Error::backfill(format!("day out of range: {} + {}d", day, n)))
}

impl Derivation {
    pub fn with_revenue(mut self, with_revenue: bool) -> Self {
        self.with_revenue = with_revenue;
        self
    }

    /// `(session column, aggregate expression)` pairs in insert order.
    pub fn columns(&self) -> Vec<(&'static str, String)> {
        let end = literal(names::SESSION_END);
        let screen_view = literal(names::SCREEN_VIEW);
        let bounce_key = literal(properties::BOUNCE);

        let known_profile = "anyIf(e.profile_id, e.profile_id != '' AND e.profile_id != e.device_id)";
        let has_bounce = format!("e.name = {} AND mapContains(e.properties, {})", end, bounce_key);
        let exit_when = format!("e.name IN ({})", in_list(names::EXIT_CANDIDATES));

        let mut not_counted = vec![names::SCREEN_VIEW];
        not_counted.extend_from_slice(names::HOUSEKEEPING);

        let mut columns = vec![
            ("id", "e.session_id".to_string()),
            ("project_id", "any(e.project_id)".to_string()),
            (
                "profile_id",
                format!("if({0} != '', {0}, any(e.device_id))", known_profile),
            ),
            ("device_id", "any(e.device_id)".to_string()),
            ("created_at", "min(e.created_at)".to_string()),
            ("ended_at", "max(e.created_at)".to_string()),
            (
                "is_bounce",
                format!(
                    "if(countIf({has}) > 0, argMaxIf(e.properties[{key}], e.created_at, {has}) IN ({truthy}), countIf(e.name = {sv}) <= 1)",
                    has = has_bounce,
                    key = bounce_key,
                    truthy = in_list(properties::BOUNCE_TRUE_VALUES),
                    sv = screen_view,
                ),
            ),
            ("entry_origin", pinned("e.origin")),
            ("entry_path", pinned("e.path")),
            ("exit_origin", format!("argMaxIf(e.origin, e.created_at, {})", exit_when)),
            ("exit_path", format!("argMaxIf(e.path, e.created_at, {})", exit_when)),
            ("screen_view_count", format!("countIf(e.name = {})", screen_view)),
            (
                "event_count",
                format!("countIf(e.name NOT IN ({}))", in_list(&not_counted)),
            ),
            ("duration", format!("sumIf(e.duration, e.name = {})", end)),
        ];

        for col in [
            "country",
            "region",
            "city",
            "longitude",
            "latitude",
            "device",
            "brand",
            "model",
            "browser",
            "browser_version",
            "os",
            "os_version",
            "referrer",
            "referrer_name",
            "referrer_type",
        ] {
            columns.push((col, pinned(&format!("e.{}", col))));
        }

        for &(col, key) in properties::UTM {
            columns.push((col, pinned(&format!("e.properties[{}]", literal(key)))));
        }

        if self.with_revenue {
            columns.push((
                "revenue",
                format!("sumIf(e.revenue, e.name = {})", literal(names::REVENUE)),
            ));
        }

        columns.push(("sign", "toInt8(1)".to_string()));
        columns.push(("version", "toUInt64(1)".to_string()));
        columns
    }

    /// Statement deriving the sessions that started on `day` (UTC).
    pub fn for_day(&self, day: NaiveDate) -> Result<String> {
        let events = Ident::new(self.events.as_str())?;
        let sessions = Ident::new(self.sessions.as_str())?;

        let next_day = add_days(day, 1)?;
        let window_end = add_days(day, 1 + TRAILING_DAYS)?;

        let columns = self.columns();
        let names = columns
            .iter()
            .map(|(name, _)| Ident::new(*name).map(|i| i.to_string()))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        // Positional against the column list; aliases named after event
        // columns would shadow them inside other aggregates
        let select = columns
            .iter()
            .map(|(_, expr)| format!("    {}", expr))
            .collect::<Vec<_>>()
            .join(",\n");

        Ok(format!(
            "INSERT INTO {sessions} ({names})\nSELECT\n{select}\nFROM {events} AS e\n\
             WHERE e.session_id != ''\n    AND e.created_at >= {lo}\n    AND e.created_at < {hi}\n\
             GROUP BY e.session_id\nHAVING min(e.created_at) < {next}",
            sessions = sessions,
            names = names,
            select = select,
            events = events,
            lo = day_start(day),
            hi = day_start(window_end),
            next = day_start(next_day),
        ))
    }

    /// One statement per day from `start` to `end`, both inclusive, oldest first.
    pub fn for_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<String>> {
        if start > end {
            return Err(Error::backfill(format!(
                "session derivation start {} is after end {}",
                start, end
            )));
        }

        start
            .iter_days()
            .take_while(|day| *day <= end)
            .map(|day| self.for_day(day))
            .collect()
    }
}

/// One collapsed session row as read back for verification.
#[derive(Debug, Clone, Row, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub project_id: String,
    pub profile_id: String,
    pub device_id: String,
    /// Unix milliseconds
    pub created_at: i64,
    /// Unix milliseconds
    pub ended_at: i64,
    pub is_bounce: bool,
    pub entry_path: String,
    pub exit_path: String,
    pub screen_view_count: u32,
    pub event_count: u32,
    pub duration: u64,
    pub sign: i8,
    pub version: u64,
}

/// Fetch the collapsed sessions of a project, oldest first.
pub async fn fetch_sessions(client: &ClickHouseClient, project_id: &str) -> Result<Vec<SessionRecord>> {
    let sql = r#"
        SELECT
            id,
            project_id,
            profile_id,
            device_id,
            toUnixTimestamp64Milli(created_at) AS created_ms,
            toUnixTimestamp64Milli(ended_at) AS ended_ms,
            is_bounce,
            entry_path,
            exit_path,
            screen_view_count,
            event_count,
            duration,
            sign,
            version
        FROM sessions FINAL
        WHERE project_id = ?
        ORDER BY created_ms, id
    "#;

    client
        .inner()
        .query(sql)
        .bind(project_id)
        .fetch_all::<SessionRecord>()
        .await
        .map_err(|e| Error::store(StoreErrorCode::ExecuteFailed, format!("Query error: {}", e)))
}
