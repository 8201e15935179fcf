//! Revenue and import tracking columns; UTM columns off bot events.

use clickhouse_client::ddl::{add_columns, drop_columns};
use clickhouse_client::schema;
use migrate_core::{MigrationId, Result};

use crate::context::MigrationContext;
use crate::migration::Migration;

pub struct WidenColumns;

impl Migration for WidenColumns {
    fn id(&self) -> MigrationId {
        MigrationId::new(3, "widen-columns")
    }

    fn plan(&self, ctx: &MigrationContext) -> Result<Vec<String>> {
        let clustered = ctx.is_clustered();
        let mut statements = Vec::new();

        statements.extend(add_columns(
            schema::EVENTS,
            &schema::event_widened_columns(),
            clustered,
        )?);
        statements.extend(add_columns(
            schema::SESSIONS,
            &schema::session_widened_columns(),
            clustered,
        )?);
        statements.extend(drop_columns(
            schema::EVENTS_BOTS,
            schema::BOT_UTM_COLUMNS,
            clustered,
        )?);

        Ok(statements)
    }
}
