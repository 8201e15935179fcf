//! Validated SQL identifiers and string literals.
//!
//! Every table, column, and cluster name that ends up inside generated DDL
//! goes through [`Ident`]. Names that match the bare identifier grammar are
//! rendered as-is; anything else is backtick-quoted with escaping.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{Error, Result};

/// Identifiers matching this pattern need no quoting.
const BARE_IDENT_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// Longest identifier accepted (ClickHouse caps file names at 255 bytes).
pub const MAX_IDENT_LEN: usize = 200;

static BARE_IDENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(BARE_IDENT_PATTERN).expect("invalid identifier pattern"));

/// A validated identifier (table, column, view, or index name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident(String);

impl Ident {
    /// Validate a raw name.
    ///
    /// Rejects empty names, names longer than [`MAX_IDENT_LEN`], and names
    /// containing control characters.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(Error::invalid_identifier("identifier must not be empty"));
        }

        if name.len() > MAX_IDENT_LEN {
            return Err(Error::invalid_identifier(format!(
                "identifier exceeds {} bytes: {}",
                MAX_IDENT_LEN, name
            )));
        }

        if name.chars().any(|c| c.is_control()) {
            return Err(Error::invalid_identifier(format!(
                "identifier contains control characters: {:?}",
                name
            )));
        }

        Ok(Self(name))
    }

    /// Raw, unquoted name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the name can be emitted without quoting.
    pub fn is_bare(&self) -> bool {
        BARE_IDENT_REGEX.is_match(&self.0)
    }

    /// Derive a sibling name such as `events_replicated` or `events_new`.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self(format!("{}{}", self.0, suffix))
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bare() {
            f.write_str(&self.0)
        } else {
            let escaped = self.0.replace('\\', "\\\\").replace('`', "\\`");
            write!(f, "`{}`", escaped)
        }
    }
}

impl FromStr for Ident {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl AsRef<str> for Ident {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Render a single-quoted SQL string literal.
pub fn literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}
