//! Base tables and aggregate views.

use clickhouse_client::ddl::{create_materialized_view, create_table};
use clickhouse_client::schema;
use migrate_core::{MigrationId, Result};

use crate::context::MigrationContext;
use crate::migration::Migration;

pub struct InitClickHouse;

impl Migration for InitClickHouse {
    fn id(&self) -> MigrationId {
        MigrationId::new(1, "init-ch")
    }

    fn plan(&self, ctx: &MigrationContext) -> Result<Vec<String>> {
        let clustered = ctx.is_clustered();
        let mut statements = Vec::new();

        for table in [
            schema::events_table(clustered),
            schema::events_bots_table(clustered),
            schema::profiles_table(clustered),
            schema::profile_aliases_table(clustered),
        ] {
            statements.extend(create_table(&table)?);
        }

        // Views last: they read from events
        for view in schema::aggregate_views(clustered) {
            statements.extend(create_materialized_view(&view)?);
        }

        Ok(statements)
    }
}
