//! Core types and errors for the analytics schema migrations.

pub mod error;
pub mod events;
pub mod ident;
pub mod migration;

pub use error::{Error, LedgerErrorCode, Result, StoreErrorCode};
pub use ident::{literal, Ident};
pub use migration::{LedgerRecord, MigrationId};
