//! Migration identity and ledger record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a registered migration script: `<version>-<name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MigrationId {
    pub version: u32,
    pub name: &'static str,
}

impl MigrationId {
    pub const fn new(version: u32, name: &'static str) -> Self {
        Self { version, name }
    }

    /// Ledger key for this script, e.g. `3-widen-columns`.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// File name of the rendered SQL artifact.
    pub fn artifact_file_name(&self) -> String {
        format!("{}.sql", self)
    }

    /// Whether an operator-supplied target names this script.
    ///
    /// Accepts the full key (`3-widen-columns`), the key with a file
    /// extension (`3-widen-columns.sql`), or the bare version (`3`).
    pub fn matches(&self, target: &str) -> bool {
        let target = target.trim();
        let stem = target
            .rsplit_once('.')
            .map(|(stem, _ext)| stem)
            .unwrap_or(target);

        stem == self.key() || stem.parse::<u32>().ok() == Some(self.version)
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.version, self.name)
    }
}

/// A completed migration as persisted in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Script key (`<version>-<name>`)
    pub name: String,
    /// First successful completion
    pub created_at: DateTime<Utc>,
    /// Latest successful completion (differs after an operator re-run)
    pub updated_at: DateTime<Utc>,
}

impl LedgerRecord {
    pub fn new(name: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            created_at: at,
            updated_at: at,
        }
    }
}
