use std::sync::Arc;

use docmigrate_common::{Error, Result};
use docmigrate_config::MigratorConfig;
use docmigrate_db::{Database, SqliteDatabase};
use futures::future::join_all;
use tracing::info;

use crate::ledger::Ledger;
use crate::procedures::{ProcedureLoader, ScriptLoader};
use crate::reconciler::{self, Scope};
use crate::source::{AvailableMigration, DirectorySource, MigrationSource};

/// Outcome of [`Migrator::up`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpReport {
    /// Batch the migrations were recorded under; `None` when nothing ran.
    pub batch: Option<u32>,
    /// Applied migrations in name order.
    pub applied: Vec<String>,
}

/// Outcome of [`Migrator::down`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownReport {
    /// Reverted migrations in ledger order.
    pub reverted: Vec<String>,
}

/// Applies and reverts migrations against a database.
///
/// Migrations selected in one call are dispatched concurrently and awaited
/// together, so no ordering between them is guaranteed. Every dispatched
/// migration runs to completion even when a sibling fails; the call then
/// returns the first failure in reconciled order. Migrations that finished
/// stay recorded (or removed); nothing is rolled back.
pub struct Migrator {
    db: Arc<dyn Database>,
    source: Arc<dyn MigrationSource>,
    loader: Arc<dyn ProcedureLoader>,
    ledger: Ledger,
    silent: bool,
}

impl Migrator {
    pub fn new(
        db: Arc<dyn Database>,
        source: Arc<dyn MigrationSource>,
        loader: Arc<dyn ProcedureLoader>,
        collection: &str,
    ) -> Self {
        Self {
            ledger: Ledger::new(db.clone(), collection),
            db,
            source,
            loader,
            silent: false,
        }
    }

    /// Connect to the configured store and read scripts from the configured
    /// migration folder.
    pub fn from_config(config: &MigratorConfig) -> Result<Self> {
        config.validate()?;
        let db = SqliteDatabase::connect(&config.url, &config.database)?;
        Ok(Self::new(
            Arc::new(db),
            Arc::new(DirectorySource::new(config.migration_folder.clone())),
            Arc::new(ScriptLoader),
            &config.collection,
        )
        .silent(config.silent))
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self.ledger = self.ledger.silent(silent);
        self
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Apply every pending migration as a new batch.
    pub async fn up(&self) -> Result<UpReport> {
        self.ledger.ensure_initialized().await?;

        let (available, records) =
            futures::try_join!(self.source.list(), self.ledger.list_applied())?;

        let batch = reconciler::next_batch(&records);
        let pending = reconciler::select_for_up(&records, &available)?;

        if pending.is_empty() {
            if !self.silent {
                info!("no migrations installed");
            }
            return Ok(UpReport::default());
        }

        first_failure(join_all(pending.iter().map(|m| self.apply(m, batch))).await)?;

        Ok(UpReport {
            batch: Some(batch),
            applied: pending.into_iter().map(|m| m.name).collect(),
        })
    }

    /// Revert the last batch, or everything with [`Scope::All`].
    pub async fn down(&self, scope: Scope) -> Result<DownReport> {
        let (available, records) =
            futures::try_join!(self.source.list(), self.ledger.list_applied())?;

        let selected = reconciler::select_for_down(&records, &available, scope)?;

        if selected.is_empty() {
            if !self.silent {
                info!("no migrations removed");
            }
            return Ok(DownReport::default());
        }

        first_failure(join_all(selected.iter().map(|m| self.revert(m))).await)?;

        Ok(DownReport {
            reverted: selected.into_iter().map(|m| m.name).collect(),
        })
    }

    pub async fn close(&self) -> Result<()> {
        self.db.close().await
    }

    async fn apply(&self, migration: &AvailableMigration, batch: u32) -> Result<()> {
        let procedures = self.loader.load(migration).await?;
        procedures
            .up(self.db.as_ref())
            .await
            .map_err(|e| failed(migration, e))?;
        self.ledger.record_applied(&migration.name, batch).await?;

        if !self.silent {
            info!(batch, "migration {} installed", migration.name);
        }
        Ok(())
    }

    async fn revert(&self, migration: &AvailableMigration) -> Result<()> {
        let procedures = self.loader.load(migration).await?;
        procedures
            .down(self.db.as_ref())
            .await
            .map_err(|e| failed(migration, e))?;
        self.ledger.record_reverted(&migration.name).await?;

        if !self.silent {
            info!("migration {} removed", migration.name);
        }
        Ok(())
    }
}

fn failed(migration: &AvailableMigration, e: Error) -> Error {
    Error::MigrationFailed {
        name: migration.name.clone(),
        source: Box::new(e),
    }
}

fn first_failure(outcomes: Vec<Result<()>>) -> Result<()> {
    outcomes.into_iter().collect()
}
