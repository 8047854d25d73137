pub mod loader;
pub mod model;

pub use loader::ConfigLoader;
pub use model::{ConfigOverrides, DEFAULT_COLLECTION, DEFAULT_MIGRATION_FOLDER, MigratorConfig};
