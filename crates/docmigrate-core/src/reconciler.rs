//! Pure comparison of the ledger against the available migrations.

use docmigrate_common::{Error, Result};

use crate::ledger::MigrationRecord;
use crate::source::AvailableMigration;

/// Which applied migrations `down` reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// Only the most recent batch.
    #[default]
    LastBatch,
    /// Every applied migration.
    All,
}

/// Highest batch number in the ledger, or 0 when it is empty.
pub fn current_batch(records: &[MigrationRecord]) -> u32 {
    records.iter().map(|r| r.batch).max().unwrap_or(0)
}

pub fn next_batch(records: &[MigrationRecord]) -> u32 {
    current_batch(records) + 1
}

/// Migrations that still need to run, in ascending name order.
///
/// The applied records must sit at the same positions as their files on
/// disk. A record found anywhere else means something was applied out of
/// timestamp order, or an earlier file was removed; that is reported as
/// [`Error::MigrationOrderDivergence`] instead of being skipped or re-run.
pub fn select_for_up(
    records: &[MigrationRecord],
    available: &[AvailableMigration],
) -> Result<Vec<AvailableMigration>> {
    let mut pending = Vec::new();
    for (expected, migration) in available.iter().enumerate() {
        match records.iter().position(|r| r.migration == migration.name) {
            None => pending.push(migration.clone()),
            Some(recorded) if recorded != expected => {
                return Err(Error::MigrationOrderDivergence {
                    name: migration.name.clone(),
                    expected,
                    recorded,
                });
            }
            Some(_) => {}
        }
    }
    Ok(pending)
}

/// Migrations to revert for `scope`, in ledger order. Every selected record
/// must still have a matching migration, otherwise there is nothing that
/// knows how to undo it.
pub fn select_for_down(
    records: &[MigrationRecord],
    available: &[AvailableMigration],
    scope: Scope,
) -> Result<Vec<AvailableMigration>> {
    let last = current_batch(records);
    records
        .iter()
        .filter(|r| scope == Scope::All || r.batch == last)
        .map(|record| {
            available
                .iter()
                .find(|m| m.name == record.migration)
                .cloned()
                .ok_or_else(|| Error::OrphanedMigrationRecord(record.migration.clone()))
        })
        .collect()
}
