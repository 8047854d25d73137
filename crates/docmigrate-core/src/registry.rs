use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use docmigrate_common::{Error, Result};

use crate::procedures::{ProcedureLoader, Procedures};
use crate::source::{AvailableMigration, MigrationSource};

/// Migrations defined in code, keyed by name. Acts as both the source and the
/// procedure loader.
#[derive(Clone, Default)]
pub struct Registry {
    migrations: BTreeMap<String, Arc<dyn Procedures>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a migration.
    pub fn register(&mut self, name: impl Into<String>, procedures: impl Procedures + 'static) {
        self.migrations.insert(name.into(), Arc::new(procedures));
    }

    pub fn with(mut self, name: impl Into<String>, procedures: impl Procedures + 'static) -> Self {
        self.register(name, procedures);
        self
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

#[async_trait]
impl MigrationSource for Registry {
    async fn list(&self) -> Result<Vec<AvailableMigration>> {
        Ok(self
            .migrations
            .keys()
            .map(|name| AvailableMigration::named(name.clone()))
            .collect())
    }
}

#[async_trait]
impl ProcedureLoader for Registry {
    async fn load(&self, migration: &AvailableMigration) -> Result<Arc<dyn Procedures>> {
        self.migrations
            .get(&migration.name)
            .cloned()
            .ok_or_else(|| Error::InvalidMigration {
                name: migration.name.clone(),
                message: "no procedures registered under this name".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedures::Script;

    #[tokio::test]
    async fn lists_registered_names_in_order() {
        let registry = Registry::new()
            .with("0003-c", Script::default())
            .with("0001-a", Script::default())
            .with("0002-b", Script::default());

        let names: Vec<_> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["0001-a", "0002-b", "0003-c"]);
        assert_eq!(registry.len(), 3);
    }

    #[tokio::test]
    async fn unknown_name_fails_to_load() {
        let registry = Registry::new().with("0001-a", Script::default());
        assert!(
            registry
                .load(&AvailableMigration::named("0001-a"))
                .await
                .is_ok()
        );
        let err = registry
            .load(&AvailableMigration::named("0002-b"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidMigration { .. }));
    }
}
