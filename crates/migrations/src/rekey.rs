//! Structural table changes through a copy-and-swap.
//!
//! ClickHouse cannot change a table's ordering key in place. The table is
//! rebuilt instead:
//!
//! 1. Create `<name>_new` with the target layout
//! 2. Backfill it from `<name>` in time windows
//! 3. Rename `<name>` to `<name>_old`
//! 4. Rename `<name>_new` to `<name>`
//! 5. Clustered only: rebuild both routers, which still point at the
//!    replicated table names they were created with
//!
//! `<name>_old` is left in place for the operator to drop.
//!
//! Materialized views stay attached to the table object they were created
//! on, which is `<name>_old` after the swap. [`rebuild_views`] drops them and
//! creates them again over the new table.

use chrono::{DateTime, Utc};
use clickhouse_client::ddl::{
    create_materialized_view, create_table, drop_table, recreate_router, rename_table, TableSpec,
    ViewSpec,
};
use migrate_core::{Error, Ident, Result};

use crate::backfill::{move_data, Backfill, BatchOptions};

pub const NEW_SUFFIX: &str = "_new";
pub const OLD_SUFFIX: &str = "_old";

/// Statements swapping `target.name` for a rebuilt copy with `target`'s layout.
///
/// Every column of `target` must exist on the current table.
pub fn swap_table(target: &TableSpec, batch: BatchOptions, now: DateTime<Utc>) -> Result<Vec<String>> {
    rebuild_table(target, |current, new| {
        let copy = Backfill::new(current.as_str(), new.as_str())
            .columns(target.column_names())
            .batched(batch);
        move_data(&copy, now)
    })
}

/// Like [`swap_table`], with `fill(current, new)` loading `<name>_new`.
pub fn rebuild_table<F>(target: &TableSpec, fill: F) -> Result<Vec<String>>
where
    F: FnOnce(&Ident, &Ident) -> Result<Vec<String>>,
{
    let name = Ident::new(target.name.as_str())?;
    if !name.is_bare() {
        return Err(Error::schema(format!(
            "cannot swap table with quoted name {}",
            name
        )));
    }

    let new_name = name.with_suffix(NEW_SUFFIX);
    let old_name = name.with_suffix(OLD_SUFFIX);
    let clustered = target.is_clustered;

    let mut statements = create_table(&target.clone().renamed(new_name.as_str()))?;
    statements.extend(fill(&name, &new_name)?);

    statements.extend(rename_table(name.as_str(), old_name.as_str(), clustered)?);
    statements.extend(rename_table(new_name.as_str(), name.as_str(), clustered)?);

    statements.extend(recreate_router(name.as_str(), &target.distribution_hash, clustered)?);
    statements.extend(recreate_router(old_name.as_str(), &target.distribution_hash, clustered)?);

    Ok(statements)
}

/// Statements re-creating `views` over the tables now holding their source names.
///
/// Each view is dropped with its stored aggregates and created again.
/// Views created with `POPULATE` refill from the swapped-in table; rows
/// inserted while the fill runs are not captured.
pub fn rebuild_views(views: &[ViewSpec]) -> Result<Vec<String>> {
    let mut statements = Vec::new();

    for view in views {
        statements.extend(drop_table(view.name.as_str(), view.is_clustered)?);
        statements.extend(create_materialized_view(view)?);
    }

    Ok(statements)
}
