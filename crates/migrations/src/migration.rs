//! The migration script seam.

use async_trait::async_trait;
use migrate_core::{MigrationId, Result};

use crate::context::MigrationContext;

/// A registered migration script.
///
/// Scripts describe their work as an ordered statement list; the default
/// `up` writes the artifact and executes it through the context.
#[async_trait]
pub trait Migration: Send + Sync {
    fn id(&self) -> MigrationId;

    /// Statements in execution order. Must not perform I/O.
    fn plan(&self, ctx: &MigrationContext) -> Result<Vec<String>>;

    async fn up(&self, ctx: &MigrationContext) -> Result<()> {
        let statements = self.plan(ctx)?;
        ctx.apply(self.id(), &statements).await
    }
}
