use std::sync::Arc;

use docmigrate_common::{Error, Result};
use docmigrate_db::{Database, Document, IndexSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

/// Field holding the migration name in ledger documents.
const MIGRATION_FIELD: &str = "migration";

/// One applied migration, as stored in the ledger collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub migration: String,
    pub batch: u32,
}

impl MigrationRecord {
    pub fn new(migration: impl Into<String>, batch: u32) -> Self {
        Self {
            migration: migration.into(),
            batch,
        }
    }
}

/// Persistent record of applied migrations, kept in a collection with a
/// unique index on the migration name.
pub struct Ledger {
    db: Arc<dyn Database>,
    collection: String,
    silent: bool,
}

impl Ledger {
    pub fn new(db: Arc<dyn Database>, collection: impl Into<String>) -> Self {
        Self {
            db,
            collection: collection.into(),
            silent: false,
        }
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Create the ledger collection and its unique index if missing. Returns
    /// whether the collection had to be created.
    pub async fn ensure_initialized(&self) -> Result<bool> {
        let created = if self.db.has_collection(&self.collection).await? {
            false
        } else {
            if !self.silent {
                info!(
                    "setting up migration collection {} in {}",
                    self.collection,
                    self.db.name()
                );
            }
            self.db.create_collection(&self.collection).await?;
            true
        };

        self.db
            .create_index(&self.collection, &IndexSpec::unique(&[MIGRATION_FIELD]))
            .await?;
        Ok(created)
    }

    /// Applied migrations in the order they were recorded.
    pub async fn list_applied(&self) -> Result<Vec<MigrationRecord>> {
        self.db
            .find(&self.collection, &Document::new())
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(Value::Object(doc)).map_err(Error::from))
            .collect()
    }

    pub async fn record_applied(&self, name: &str, batch: u32) -> Result<()> {
        let Value::Object(document) = serde_json::to_value(MigrationRecord::new(name, batch))?
        else {
            return Err(Error::Database("ledger record did not serialize to a document".into()));
        };

        match self.db.insert_one(&self.collection, document).await {
            Ok(()) => {
                debug!("recorded {name} in batch {batch}");
                Ok(())
            }
            Err(Error::DuplicateKey { .. }) => Err(Error::DuplicateMigration(name.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Remove the record for `name`. The caller must know the record exists;
    /// removing nothing is an error.
    pub async fn record_reverted(&self, name: &str) -> Result<()> {
        let removed = self
            .db
            .delete_many(&self.collection, &name_filter(name))
            .await?;
        if removed == 0 {
            return Err(Error::Database(format!(
                "no ledger record for migration {name}"
            )));
        }
        debug!("removed {name} from ledger");
        Ok(())
    }
}

fn name_filter(name: &str) -> Document {
    let mut filter = Document::new();
    filter.insert(MIGRATION_FIELD.to_string(), Value::String(name.to_string()));
    filter
}
