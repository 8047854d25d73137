mod args;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use docmigrate_config::ConfigLoader;
use docmigrate_core::{Migrator, Scope};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::args::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = ConfigLoader::resolve(cli.config.as_deref(), cli.overrides())
        .context("invalid configuration")?;
    init_tracing(config.silent);
    debug!(
        "using database {} at {} (ledger {}, migrations in {})",
        config.database,
        config.url,
        config.collection,
        config.migration_folder.display()
    );

    let migrator = Migrator::from_config(&config).context("failed to open database")?;

    let outcome = run(&migrator, command).await;
    let closed = migrator.close().await;

    outcome?;
    closed.context("failed to close database")?;
    Ok(())
}

async fn run(migrator: &Migrator, command: Command) -> Result<()> {
    match command {
        Command::Up => {
            let report = migrator.up().await.context("migrate up failed")?;
            if let Some(batch) = report.batch {
                info!(
                    "applied {} migration(s) in batch {batch}",
                    report.applied.len()
                );
            }
        }
        Command::Down { all } => {
            let scope = if all { Scope::All } else { Scope::LastBatch };
            let report = migrator.down(scope).await.context("migrate down failed")?;
            if !report.reverted.is_empty() {
                info!("reverted {} migration(s)", report.reverted.len());
            }
        }
    }
    Ok(())
}

/// `RUST_LOG` wins unless `--silent` was given, which caps output at warnings.
fn init_tracing(silent: bool) {
    let filter = if silent {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
