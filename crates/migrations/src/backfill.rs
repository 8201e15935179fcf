//! Batched backfill planning.
//!
//! Moving a large table in one `INSERT ... SELECT` risks hitting execution
//! limits and cannot be observed. The planner splits the copy into
//! windows on a time column, walking backward from the end date:
//!
//! ```text
//! (end - 1m, end], (end - 2m, end - 1m], ..., [start, end - km]
//! ```
//!
//! Windows are contiguous and do not overlap. The oldest window is clamped
//! to the start date and includes it.

use chrono::{DateTime, Duration, Months, Utc};
use migrate_core::{literal, Error, Ident, Result};

/// Default backfill horizon when no start date is given.
pub const DEFAULT_LOOKBACK_MONTHS: u32 = 36;

/// Default rendering of window bounds.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Window length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Day,
    Week,
    Month,
}

impl Interval {
    /// `end` moved back by `steps` intervals, `None` when out of range.
    ///
    /// Steps are always taken from `end` so month lengths do not drift;
    /// a day past the end of a shorter month is clamped to its last day.
    pub fn back_from(&self, end: DateTime<Utc>, steps: u32) -> Option<DateTime<Utc>> {
        match self {
            Self::Day => end.checked_sub_signed(Duration::days(steps as i64)),
            Self::Week => end.checked_sub_signed(Duration::weeks(steps as i64)),
            Self::Month => end.checked_sub_months(Months::new(steps)),
        }
    }
}

/// One backfill window.
///
/// Covers `(lower, upper]`, or `[lower, upper]` when `lower_inclusive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub lower: DateTime<Utc>,
    pub upper: DateTime<Utc>,
    pub lower_inclusive: bool,
}

impl Window {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let above = if self.lower_inclusive {
            at >= self.lower
        } else {
            at > self.lower
        };
        above && at <= self.upper
    }
}

/// Split `[start, end]` into windows, newest first.
pub fn plan_windows(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval: Interval,
) -> Result<Vec<Window>> {
    if start > end {
        return Err(Error::backfill(format!(
            "backfill start {} is after end {}",
            start, end
        )));
    }

    let mut windows = Vec::new();
    let mut upper = end;
    let mut steps = 1;

    loop {
        match interval.back_from(end, steps) {
            Some(lower) if lower > start => {
                windows.push(Window {
                    lower,
                    upper,
                    lower_inclusive: false,
                });
                upper = lower;
                steps += 1;
            }
            _ => {
                windows.push(Window {
                    lower: start,
                    upper,
                    lower_inclusive: true,
                });
                return Ok(windows);
            }
        }
    }
}

/// Windowing parameters for a batched copy.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Time column the windows are applied to
    pub column: String,
    pub interval: Interval,
    /// Defaults to [`DEFAULT_LOOKBACK_MONTHS`] before now
    pub start: Option<DateTime<Utc>>,
    /// Defaults to now
    pub end: Option<DateTime<Utc>>,
    /// Renders window bounds; defaults to [`DEFAULT_DATE_FORMAT`]
    pub format: Option<fn(&DateTime<Utc>) -> String>,
}

impl BatchOptions {
    pub fn new(column: &str, interval: Interval) -> Self {
        Self {
            column: column.to_string(),
            interval,
            start: None,
            end: None,
            format: None,
        }
    }

    pub fn since(mut self, start: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self
    }

    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_format(mut self, format: fn(&DateTime<Utc>) -> String) -> Self {
        self.format = Some(format);
        self
    }

    fn render(&self, at: &DateTime<Utc>) -> String {
        match self.format {
            Some(format) => format(at),
            None => at.format(DEFAULT_DATE_FORMAT).to_string(),
        }
    }
}

/// A table-to-table copy.
#[derive(Debug, Clone)]
pub struct Backfill {
    pub from: String,
    pub to: String,
    /// Explicit column list; `SELECT *` when absent
    pub columns: Option<Vec<String>>,
    /// Unbounded single statement when absent (small tables only)
    pub batch: Option<BatchOptions>,
}

impl Backfill {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            columns: None,
            batch: None,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn batched(mut self, batch: BatchOptions) -> Self {
        self.batch = Some(batch);
        self
    }
}

/// Render the copy as `INSERT ... SELECT` statements.
///
/// `now` anchors the default start and end dates.
pub fn move_data(spec: &Backfill, now: DateTime<Utc>) -> Result<Vec<String>> {
    let from = Ident::new(spec.from.as_str())?;
    let to = Ident::new(spec.to.as_str())?;

    let (target, select) = match spec.columns {
        Some(ref columns) if columns.is_empty() => {
            return Err(Error::backfill(format!(
                "empty column list for copy {} -> {}",
                from, to
            )));
        }
        Some(ref columns) => {
            let list = columns
                .iter()
                .map(|c| Ident::new(c.as_str()).map(|c| c.to_string()))
                .collect::<Result<Vec<_>>>()?
                .join(", ");
            (format!("{} ({})", to, list), list)
        }
        None => (to.to_string(), "*".to_string()),
    };

    let base = format!("INSERT INTO {} SELECT {} FROM {}", target, select, from);

    let Some(ref batch) = spec.batch else {
        return Ok(vec![base]);
    };

    let column = Ident::new(batch.column.as_str())?;
    let end = batch.end.unwrap_or(now);
    let start = match batch.start {
        Some(start) => start,
        None => end
            .checked_sub_months(Months::new(DEFAULT_LOOKBACK_MONTHS))
            .ok_or_else(|| Error::backfill(format!("cannot look back from {}", end)))?,
    };

    let windows = plan_windows(start, end, batch.interval)?;

    Ok(windows
        .iter()
        .map(|window| {
            let op = if window.lower_inclusive { ">=" } else { ">" };
            format!(
                "{} WHERE {} {} {} AND {} <= {}",
                base,
                column,
                op,
                literal(&batch.render(&window.lower)),
                column,
                literal(&batch.render(&window.upper))
            )
        })
        .collect())
}
