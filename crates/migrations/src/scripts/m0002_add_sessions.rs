//! Sessions table, rebuilt from historical events one day at a time.

use clickhouse_client::ddl::create_table;
use clickhouse_client::{schema, Derivation};
use migrate_core::{MigrationId, Result};

use crate::context::MigrationContext;
use crate::migration::Migration;

pub struct AddSessions;

impl Migration for AddSessions {
    fn id(&self) -> MigrationId {
        MigrationId::new(2, "add-sessions")
    }

    fn plan(&self, ctx: &MigrationContext) -> Result<Vec<String>> {
        let mut statements = create_table(&schema::sessions_table(ctx.is_clustered()))?;

        let since = ctx.derivation_since()?;
        // `revenue` only arrives with the column widening
        let derivation = Derivation::default().with_revenue(false);
        statements.extend(derivation.for_range(since.date_naive(), ctx.now().date_naive())?);

        Ok(statements)
    }
}
