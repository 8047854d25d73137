//! Ordered, reversible migrations for document databases.
//!
//! A [`MigrationSource`] lists the migrations available on disk, a [`Ledger`]
//! records which of them were applied and in which batch, the [`reconciler`]
//! compares the two, and the [`Migrator`] runs the selected procedures.

pub mod ledger;
pub mod migrator;
pub mod procedures;
pub mod reconciler;
pub mod registry;
pub mod source;

pub use ledger::{Ledger, MigrationRecord};
pub use migrator::{DownReport, Migrator, UpReport};
pub use procedures::{ProcedureLoader, Procedures, Script, ScriptLoader, Step};
pub use reconciler::Scope;
pub use registry::Registry;
pub use source::{AvailableMigration, DirectorySource, MigrationSource, SCRIPT_EXTENSIONS};
