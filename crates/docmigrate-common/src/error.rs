use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    /// Raw uniqueness violation reported by the document store.
    #[error("duplicate key in {collection}: {detail}")]
    DuplicateKey { collection: String, detail: String },

    #[error("migration source unavailable at {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The applied order recorded in the ledger disagrees with the on-disk order.
    #[error(
        "migration order diverged: {name} is applied at position {recorded} but sorts at position {expected} on disk"
    )]
    MigrationOrderDivergence {
        name: String,
        expected: usize,
        recorded: usize,
    },

    #[error("ledger references migration {0} which has no matching migration file")]
    OrphanedMigrationRecord(String),

    #[error("migration {0} is already recorded as applied")]
    DuplicateMigration(String),

    #[error("invalid migration {name}: {message}")]
    InvalidMigration { name: String, message: String },

    #[error("migration {name} failed: {source}")]
    MigrationFailed {
        name: String,
        #[source]
        source: Box<Error>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn error_display_includes_context() {
        let e = Error::Config("url is required".into());
        assert_eq!(e.to_string(), "configuration error: url is required");

        let e = Error::OrphanedMigrationRecord("0001-a.yml".into());
        assert_eq!(
            e.to_string(),
            "ledger references migration 0001-a.yml which has no matching migration file"
        );

        let e = Error::MigrationOrderDivergence {
            name: "0002-b.yml".into(),
            expected: 1,
            recorded: 0,
        };
        assert_eq!(
            e.to_string(),
            "migration order diverged: 0002-b.yml is applied at position 0 but sorts at position 1 on disk"
        );
    }

    #[test]
    fn source_unavailable_keeps_io_source() {
        use std::error::Error as _;

        let e = Error::SourceUnavailable {
            path: "./missing".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(e.to_string().starts_with("migration source unavailable at ./missing"));
        assert!(e.source().is_some());
    }

    #[test]
    fn migration_failed_keeps_procedure_error() {
        use std::error::Error as _;

        let e = Error::MigrationFailed {
            name: "0003-c.yml".into(),
            source: Box::new(Error::DuplicateKey {
                collection: "users".into(),
                detail: "email".into(),
            }),
        };
        assert!(e.to_string().starts_with("migration 0003-c.yml failed: "));
        assert!(e.source().is_some_and(|s| s.to_string().contains("users")));
        let Error::MigrationFailed { source, .. } = &e else {
            unreachable!()
        };
        assert!(matches!(**source, Error::DuplicateKey { ref collection, .. } if collection == "users"));
    }
}
