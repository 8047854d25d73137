use std::path::Path;

use docmigrate_common::{Error, Result};
use tracing::debug;

use crate::model::{ConfigOverrides, MigratorConfig};

/// Loads configuration layers from disk and resolves them into a
/// [`MigratorConfig`].
pub struct ConfigLoader;

impl ConfigLoader {
    /// Read a YAML or TOML config file, chosen by extension.
    pub fn load_file(path: &Path) -> Result<ConfigOverrides> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config {}: {e}", path.display()))
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let overrides = match ext {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}")))?,
            "toml" => toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("TOML parse error: {e}")))?,
            other => {
                return Err(Error::Config(format!(
                    "unsupported config extension: {other}"
                )));
            }
        };

        debug!("loaded config layer from {}", path.display());
        Ok(overrides)
    }

    /// Merge an optional config file with command-line overrides and validate
    /// the result.
    pub fn resolve(file: Option<&Path>, flags: ConfigOverrides) -> Result<MigratorConfig> {
        let base = match file {
            Some(path) => Self::load_file(path)?,
            None => ConfigOverrides::default(),
        };
        MigratorConfig::from_overrides(base.merge(flags))
    }
}
