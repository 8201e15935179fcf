//! Migration registry, runner, ledger and backfill planning.
//!
//! A run walks the registry in version order. Each script renders its
//! statements, writes them to a `.sql` artifact and executes them one at a
//! time; a completed script is then recorded in the ledger.

pub mod artifact;
pub mod backfill;
pub mod context;
pub mod ledger;
pub mod migration;
pub mod registry;
pub mod rekey;
pub mod runner;
pub mod scripts;

pub use backfill::{move_data, plan_windows, Backfill, BatchOptions, Interval, Window};
pub use context::{MigrationContext, MigrationOptions};
pub use ledger::{Ledger, PgLedger};
pub use migration::Migration;
pub use registry::Registry;
pub use rekey::{rebuild_table, rebuild_views, swap_table};
pub use runner::{Plan, RunOptions, RunReport, Runner};
