//! Ordered, compile-time registry of migration scripts.

use migrate_core::{Error, MigrationId, Result};

use crate::migration::Migration;
use crate::scripts;

/// Scripts in ascending version order.
pub struct Registry {
    scripts: Vec<Box<dyn Migration>>,
}

impl Registry {
    /// Build a registry, rejecting out-of-order or duplicate versions.
    pub fn new(scripts: Vec<Box<dyn Migration>>) -> Result<Self> {
        let mut previous: Option<MigrationId> = None;

        for script in &scripts {
            let id = script.id();

            if id.name.trim().is_empty() {
                return Err(Error::registry(format!(
                    "migration {} has an empty name",
                    id.version
                )));
            }

            if let Some(prev) = previous {
                if id.version <= prev.version {
                    return Err(Error::registry(format!(
                        "migration versions must be strictly increasing: {} follows {}",
                        id, prev
                    )));
                }
            }

            previous = Some(id);
        }

        Ok(Self { scripts })
    }

    /// The scripts shipped with this build.
    pub fn builtin() -> Result<Self> {
        Self::new(scripts::all())
    }

    pub fn scripts(&self) -> impl Iterator<Item = &dyn Migration> {
        self.scripts.iter().map(|s| s.as_ref())
    }

    pub fn ids(&self) -> Vec<MigrationId> {
        self.scripts.iter().map(|s| s.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Look up a script by key (`3-widen-columns`), file name, or version.
    pub fn find(&self, target: &str) -> Result<&dyn Migration> {
        self.scripts
            .iter()
            .find(|s| s.id().matches(target))
            .map(|s| s.as_ref())
            .ok_or_else(|| Error::UnknownMigration(target.to_string()))
    }
}
