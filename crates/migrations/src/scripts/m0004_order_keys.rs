//! New ordering keys for events and sessions.
//!
//! The aggregate views over `events` are rebuilt after its swap and refill
//! from the re-keyed table. `sessions_new` is derived again from the
//! re-keyed events rather than copied, so sessions pick up `revenue`.

use clickhouse_client::{schema, Derivation};
use migrate_core::{MigrationId, Result};

use crate::backfill::{BatchOptions, Interval};
use crate::context::MigrationContext;
use crate::migration::Migration;
use crate::rekey::{rebuild_table, rebuild_views, swap_table};

pub struct OrderKeys;

impl Migration for OrderKeys {
    fn id(&self) -> MigrationId {
        MigrationId::new(4, "order-keys")
    }

    fn plan(&self, ctx: &MigrationContext) -> Result<Vec<String>> {
        let clustered = ctx.is_clustered();
        let batch = BatchOptions::new("created_at", Interval::Month)
            .since(ctx.backfill_since())
            .until(ctx.now());

        let mut statements = swap_table(
            &schema::events_rekeyed_table(schema::EVENTS, clustered),
            batch,
            ctx.now(),
        )?;
        statements.extend(rebuild_views(&schema::aggregate_views(clustered))?);

        let since = ctx.derivation_since()?.date_naive();
        let until = ctx.now().date_naive();
        statements.extend(rebuild_table(
            &schema::sessions_rekeyed_table(schema::SESSIONS, clustered),
            |_, new| {
                Derivation {
                    sessions: new.as_str().to_string(),
                    ..Derivation::default()
                }
                .with_revenue(true)
                .for_range(since, until)
            },
        )?);

        Ok(statements)
    }
}
