//! Unified error types for the migration tooling.
//!
//! Error codes:
//! - CH_001-003: Analytics store errors
//! - LEDGER_001-002: Migration ledger errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Analytics store error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// CH_001: Statement rejected or failed while running
    ExecuteFailed,
    /// CH_002: Progress introspection query failed
    ProgressFailed,
    /// CH_003: Kill of an in-flight query failed
    KillFailed,
}

impl StoreErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ExecuteFailed => "CH_001",
            Self::ProgressFailed => "CH_002",
            Self::KillFailed => "CH_003",
        }
    }
}

/// Ledger error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerErrorCode {
    /// LEDGER_001: Reading applied migrations failed
    ReadFailed,
    /// LEDGER_002: Recording a completed migration failed
    WriteFailed,
}

impl LedgerErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ReadFailed => "LEDGER_001",
            Self::WriteFailed => "LEDGER_002",
        }
    }
}

/// Unified error type for the migration tooling.
#[derive(Debug, Error)]
pub enum Error {
    /// Analytics store error with code.
    #[error("[{code}] {message}")]
    Store { code: &'static str, message: String },

    /// Ledger error with code.
    #[error("[{code}] {message}")]
    Ledger { code: &'static str, message: String },

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("backfill error: {0}")]
    Backfill(String),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("unknown migration: {0}")]
    UnknownMigration(String),

    /// A migration script's entry point returned an error.
    #[error("migration {name} failed: {source}")]
    MigrationFailed {
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// The run was stopped by a termination signal.
    #[error("interrupted by {0}")]
    Interrupted(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an analytics store error.
    pub fn store(code: StoreErrorCode, msg: impl Into<String>) -> Self {
        Self::Store {
            code: code.code(),
            message: msg.into(),
        }
    }

    /// Create a ledger error.
    pub fn ledger(code: LedgerErrorCode, msg: impl Into<String>) -> Self {
        Self::Ledger {
            code: code.code(),
            message: msg.into(),
        }
    }

    pub fn invalid_identifier(msg: impl Into<String>) -> Self {
        Self::InvalidIdentifier(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn backfill(msg: impl Into<String>) -> Self {
        Self::Backfill(msg.into())
    }

    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap an entry point failure with the script name.
    pub fn migration_failed(name: impl Into<String>, source: Error) -> Self {
        Self::MigrationFailed {
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Store { code, .. } => Some(code),
            Self::Ledger { code, .. } => Some(code),
            Self::MigrationFailed { source, .. } => source.error_code(),
            _ => None,
        }
    }

    /// Whether the error was caused by an operator interrupt.
    pub fn is_interrupted(&self) -> bool {
        match self {
            Self::Interrupted(_) => true,
            Self::MigrationFailed { source, .. } => source.is_interrupted(),
            _ => false,
        }
    }

    /// Whether the error was raised before any I/O took place.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdentifier(_) | Self::Schema(_) | Self::Backfill(_) | Self::Registry(_)
        )
    }
}
