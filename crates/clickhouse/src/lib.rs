//! ClickHouse DDL generation, statement execution and the analytics schema set.

pub mod cancel;
pub mod client;
pub mod config;
pub mod ddl;
pub mod executor;
pub mod health;
pub mod ops;
pub mod schema;
pub mod sessions;
pub mod store;

pub use cancel::{CancelToken, SignalGuard};
pub use client::*;
pub use config::*;
pub use executor::{statement_id, Executor, DEFAULT_POLL_INTERVAL};
pub use ops::QueryProgress;
pub use sessions::{Derivation, SessionRecord};
pub use store::Store;
