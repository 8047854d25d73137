pub mod database;
pub mod sqlite;

pub use database::{Database, Document, IndexSpec, matches_filter};
pub use sqlite::SqliteDatabase;
