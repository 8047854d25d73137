use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use docmigrate_common::{Error, Result};
use docmigrate_db::{Database, Document, IndexSpec};
use serde::Deserialize;
use tracing::debug;

use crate::source::AvailableMigration;

/// The two directions of a migration. Both receive the target database.
#[async_trait]
pub trait Procedures: Send + Sync {
    async fn up(&self, db: &dyn Database) -> Result<()>;

    async fn down(&self, db: &dyn Database) -> Result<()>;
}

/// Resolves a migration to its procedures. Called only for migrations that
/// were selected to run, so a broken file elsewhere in the folder does not
/// block unrelated runs.
#[async_trait]
pub trait ProcedureLoader: Send + Sync {
    async fn load(&self, migration: &AvailableMigration) -> Result<Arc<dyn Procedures>>;
}

/// A declarative migration file.
///
/// ```yaml
/// up:
///   - op: create_collection
///     name: accounts
///   - op: create_index
///     collection: accounts
///     keys: [provider, providerId]
///     unique: true
/// down:
///   - op: drop_collection
///     name: accounts
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    #[serde(default)]
    pub up: Vec<Step>,
    #[serde(default)]
    pub down: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    CreateCollection {
        name: String,
    },
    DropCollection {
        name: String,
    },
    CreateIndex {
        collection: String,
        keys: Vec<String>,
        #[serde(default)]
        unique: bool,
        #[serde(default)]
        name: Option<String>,
    },
    Insert {
        collection: String,
        documents: Vec<Document>,
    },
    Update {
        collection: String,
        #[serde(default)]
        filter: Document,
        set: Document,
    },
    Delete {
        collection: String,
        #[serde(default)]
        filter: Document,
    },
}

impl Step {
    pub async fn apply(&self, db: &dyn Database) -> Result<()> {
        match self {
            Step::CreateCollection { name } => db.create_collection(name).await,
            Step::DropCollection { name } => db.drop_collection(name).await,
            Step::CreateIndex {
                collection,
                keys,
                unique,
                name,
            } => {
                let index = IndexSpec {
                    keys: keys.clone(),
                    unique: *unique,
                    name: name.clone(),
                };
                db.create_index(collection, &index).await.map(|_| ())
            }
            Step::Insert {
                collection,
                documents,
            } => {
                for document in documents {
                    db.insert_one(collection, document.clone()).await?;
                }
                Ok(())
            }
            Step::Update {
                collection,
                filter,
                set,
            } => db.update_many(collection, filter, set).await.map(|_| ()),
            Step::Delete { collection, filter } => {
                db.delete_many(collection, filter).await.map(|_| ())
            }
        }
    }
}

impl Script {
    /// Parse script text, picking the format from the file extension.
    pub fn parse(name: &str, extension: &str, contents: &str) -> Result<Self> {
        let invalid = |message: String| Error::InvalidMigration {
            name: name.to_string(),
            message,
        };
        match extension {
            "yml" | "yaml" => serde_yaml::from_str(contents)
                .map_err(|e| invalid(format!("YAML parse error: {e}"))),
            "json" => serde_json::from_str(contents)
                .map_err(|e| invalid(format!("JSON parse error: {e}"))),
            "toml" => {
                toml::from_str(contents).map_err(|e| invalid(format!("TOML parse error: {e}")))
            }
            other => Err(invalid(format!("unsupported script extension: {other}"))),
        }
    }

    async fn run(steps: &[Step], db: &dyn Database) -> Result<()> {
        for step in steps {
            step.apply(db).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Procedures for Script {
    async fn up(&self, db: &dyn Database) -> Result<()> {
        Script::run(&self.up, db).await
    }

    async fn down(&self, db: &dyn Database) -> Result<()> {
        Script::run(&self.down, db).await
    }
}

/// Loads [`Script`]s from the files found by a
/// [`DirectorySource`](crate::source::DirectorySource).
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptLoader;

#[async_trait]
impl ProcedureLoader for ScriptLoader {
    async fn load(&self, migration: &AvailableMigration) -> Result<Arc<dyn Procedures>> {
        let path = migration
            .path
            .as_deref()
            .ok_or_else(|| Error::InvalidMigration {
                name: migration.name.clone(),
                message: "migration has no backing file".into(),
            })?;

        let contents = tokio::fs::read_to_string(path).await?;
        let script = Script::parse(&migration.name, extension_of(path), &contents)?;
        debug!(
            "loaded {} ({} up steps, {} down steps)",
            migration.name,
            script.up.len(),
            script.down.len()
        );
        Ok(Arc::new(script))
    }
}

fn extension_of(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}
