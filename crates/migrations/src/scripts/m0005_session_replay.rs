//! Session replay chunk storage.

use clickhouse_client::ddl::create_table;
use clickhouse_client::schema;
use migrate_core::{MigrationId, Result};

use crate::context::MigrationContext;
use crate::migration::Migration;

pub struct SessionReplay;

impl Migration for SessionReplay {
    fn id(&self) -> MigrationId {
        MigrationId::new(5, "session-replay")
    }

    fn plan(&self, ctx: &MigrationContext) -> Result<Vec<String>> {
        create_table(&schema::session_replay_chunks_table(ctx.is_clustered()))
    }
}
