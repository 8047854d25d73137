use std::path::PathBuf;

use docmigrate_common::{Error, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_COLLECTION: &str = "migrations";
pub const DEFAULT_MIGRATION_FOLDER: &str = "./migrations";

/// Fully resolved settings for a migrator run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigratorConfig {
    /// Connection URL of the document store.
    pub url: String,
    /// Name of the database inside the store.
    pub database: String,
    /// Ledger collection name.
    pub collection: String,
    /// Directory holding the migration files.
    pub migration_folder: PathBuf,
    /// Suppress progress logging.
    pub silent: bool,
}

/// A partial configuration layer. Layers are merged (file, then environment
/// and flags) before being resolved into a [`MigratorConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    pub url: Option<String>,
    pub database: Option<String>,
    pub collection: Option<String>,
    pub migration_folder: Option<PathBuf>,
    pub silent: Option<bool>,
}

impl ConfigOverrides {
    /// Overlay `other` on top of `self`; values set in `other` win.
    pub fn merge(self, other: ConfigOverrides) -> ConfigOverrides {
        ConfigOverrides {
            url: other.url.or(self.url),
            database: other.database.or(self.database),
            collection: other.collection.or(self.collection),
            migration_folder: other.migration_folder.or(self.migration_folder),
            silent: other.silent.or(self.silent),
        }
    }
}

impl MigratorConfig {
    /// Fill defaults and check required fields.
    pub fn from_overrides(overrides: ConfigOverrides) -> Result<Self> {
        let config = Self {
            url: overrides.url.unwrap_or_default(),
            database: overrides.database.unwrap_or_default(),
            collection: overrides
                .collection
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            migration_folder: overrides
                .migration_folder
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MIGRATION_FOLDER)),
            silent: overrides.silent.unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::Config("connection url is required".into()));
        }
        if self.database.trim().is_empty() {
            return Err(Error::Config("database name is required".into()));
        }
        if self.collection.trim().is_empty() {
            return Err(Error::Config("ledger collection name cannot be empty".into()));
        }
        if self.migration_folder.as_os_str().is_empty() {
            return Err(Error::Config("migration folder cannot be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required() -> ConfigOverrides {
        ConfigOverrides {
            url: Some("sqlite://./data".into()),
            database: Some("app".into()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_are_filled_in() {
        let config = MigratorConfig::from_overrides(required()).unwrap();
        assert_eq!(config.collection, "migrations");
        assert_eq!(config.migration_folder, PathBuf::from("./migrations"));
        assert!(!config.silent);
    }

    #[test]
    fn missing_url_fails_fast() {
        let overrides = ConfigOverrides {
            url: None,
            ..required()
        };
        let err = MigratorConfig::from_overrides(overrides).unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration error: connection url is required"
        );
    }

    #[test]
    fn missing_database_fails_fast() {
        let overrides = ConfigOverrides {
            database: Some("  ".into()),
            ..required()
        };
        let err = MigratorConfig::from_overrides(overrides).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("database")));
    }

    #[test]
    fn later_layer_wins_on_merge() {
        let file = ConfigOverrides {
            collection: Some("from_file".into()),
            silent: Some(true),
            ..required()
        };
        let flags = ConfigOverrides {
            collection: Some("from_flags".into()),
            ..Default::default()
        };

        let merged = file.merge(flags);
        assert_eq!(merged.collection.as_deref(), Some("from_flags"));
        assert_eq!(merged.silent, Some(true));
        assert_eq!(merged.database.as_deref(), Some("app"));
    }
}
