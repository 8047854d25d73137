use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docmigrate_config::ConfigOverrides;

/// Ordered, reversible migrations for document databases.
#[derive(Parser, Debug)]
#[command(name = "docmigrate", version, about)]
pub struct Cli {
    /// Connection url (`sqlite://<dir>`, `file:///<dir>`, a directory, or `sqlite::memory:`)
    #[arg(short, long, env = "DOCMIGRATE_URL", global = true)]
    pub url: Option<String>,

    /// Database name
    #[arg(short, long, env = "DOCMIGRATE_DATABASE", global = true)]
    pub database: Option<String>,

    /// Ledger collection name [default: migrations]
    #[arg(short, long, env = "DOCMIGRATE_COLLECTION", global = true)]
    pub collection: Option<String>,

    /// Folder holding migration scripts [default: ./migrations]
    #[arg(short = 'm', long = "migrations", env = "DOCMIGRATE_MIGRATIONS", global = true)]
    pub migration_folder: Option<PathBuf>,

    /// YAML or TOML file with default settings
    #[arg(long, env = "DOCMIGRATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Silence progress output
    #[arg(short, long, global = true)]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Apply all pending migrations as a new batch
    Up,
    /// Revert the last batch of migrations
    Down {
        /// Revert every applied migration
        #[arg(short, long)]
        all: bool,
    },
}

impl Cli {
    /// Settings given on the command line or through the environment. An
    /// absent `--silent` leaves the config file's value in place.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            url: self.url.clone(),
            database: self.database.clone(),
            collection: self.collection.clone(),
            migration_folder: self.migration_folder.clone(),
            silent: self.silent.then_some(true),
        }
    }
}
