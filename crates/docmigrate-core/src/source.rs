use std::path::PathBuf;

use async_trait::async_trait;
use docmigrate_common::{Error, Result};
use tracing::{debug, warn};

/// File extensions recognised as migration scripts.
pub const SCRIPT_EXTENSIONS: &[&str] = &["yml", "yaml", "json", "toml"];

/// A migration that can be run. Procedures are resolved later, only for the
/// migrations actually selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableMigration {
    /// File name, starting with a sortable timestamp, e.g.
    /// `1546300800000-create-users.yml`.
    pub name: String,
    /// Where the migration is defined, if it comes from a file.
    pub path: Option<PathBuf>,
}

impl AvailableMigration {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
        }
    }
}

/// Enumerates available migrations, sorted ascending by name.
#[async_trait]
pub trait MigrationSource: Send + Sync {
    async fn list(&self) -> Result<Vec<AvailableMigration>>;
}

/// Lists migration scripts from a single directory (non-recursive).
pub struct DirectorySource {
    folder: PathBuf,
}

impl DirectorySource {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    fn unavailable(&self, source: std::io::Error) -> Error {
        Error::SourceUnavailable {
            path: self.folder.clone(),
            source,
        }
    }
}

#[async_trait]
impl MigrationSource for DirectorySource {
    async fn list(&self) -> Result<Vec<AvailableMigration>> {
        let mut entries = tokio::fs::read_dir(&self.folder)
            .await
            .map_err(|e| self.unavailable(e))?;

        let mut migrations = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| self.unavailable(e))? {
            let file_type = entry.file_type().await.map_err(|e| self.unavailable(e))?;
            if !file_type.is_file() {
                continue;
            }

            let path = entry.path();
            let is_script = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext));
            if !is_script {
                continue;
            }

            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!("skipping migration with non UTF-8 file name: {}", path.display());
                continue;
            };
            migrations.push(AvailableMigration {
                name,
                path: Some(path),
            });
        }

        migrations.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(
            "found {} migration files in {}",
            migrations.len(),
            self.folder.display()
        );
        Ok(migrations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "up: []\ndown: []\n").unwrap();
    }

    #[tokio::test]
    async fn lists_scripts_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "1546300800300-c.yml");
        touch(dir.path(), "1546300800100-a.json");
        touch(dir.path(), "1546300800200-b.toml");

        let source = DirectorySource::new(dir.path());
        let names: Vec<_> = source
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(
            names,
            vec!["1546300800100-a.json", "1546300800200-b.toml", "1546300800300-c.yml"]
        );
    }

    #[tokio::test]
    async fn ignores_other_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "0001-a.yml");
        touch(dir.path(), "README.md");
        std::fs::create_dir(dir.path().join("0002-nested.yml")).unwrap();

        let source = DirectorySource::new(dir.path());
        let migrations = source.list().await.unwrap();
        assert_eq!(migrations.len(), 1);
        assert_eq!(migrations[0].name, "0001-a.yml");
        assert_eq!(
            migrations[0].path.as_deref(),
            Some(dir.path().join("0001-a.yml").as_path())
        );
    }

    #[tokio::test]
    async fn missing_folder_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySource::new(dir.path().join("nope"));
        let err = source.list().await.unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }
}
