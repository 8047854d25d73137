use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use docmigrate_common::{Error, Result};
use rusqlite::{Connection, ErrorCode, params};
use tracing::debug;
use url::Url;

use crate::database::{Database, Document, IndexSpec, matches_filter};

/// URL that selects a throwaway in-memory store.
pub const MEMORY_URL: &str = "sqlite::memory:";

/// Embedded document database. Each collection is a table of JSON documents
/// keyed by an autoincrement id, so rowid order is insertion order. Indexes
/// are SQLite expression indexes over `json_extract`.
pub struct SqliteDatabase {
    name: String,
    conn: Mutex<Option<Connection>>,
}

enum Location {
    Memory,
    Directory(PathBuf),
}

impl SqliteDatabase {
    /// Open the database named `database` at the location given by `url`:
    /// `sqlite://<dir>`, `file:///<dir>`, a bare directory path, or
    /// [`MEMORY_URL`]. File-backed databases live in `<dir>/<database>.db`.
    pub fn connect(url: &str, database: &str) -> Result<Self> {
        validate_database_name(database)?;
        match resolve_location(url)? {
            Location::Memory => Self::in_memory(database),
            Location::Directory(dir) => {
                std::fs::create_dir_all(&dir).map_err(|e| {
                    Error::Database(format!(
                        "failed to create data directory {}: {e}",
                        dir.display()
                    ))
                })?;
                Self::open(&dir.join(format!("{database}.db")), database)
            }
        }
    }

    pub fn open(db_path: &Path, database: &str) -> Result<Self> {
        debug!("opening document store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Ok(Self {
            name: database.to_string(),
            conn: Mutex::new(Some(conn)),
        })
    }

    pub fn in_memory(database: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        Ok(Self {
            name: database.to_string(),
            conn: Mutex::new(Some(conn)),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| Error::Database("document store lock poisoned".into()))?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| Error::Database(format!("database {} is closed", self.name)))?;
        f(conn)
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT name FROM sqlite_master
                     WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
                     ORDER BY name",
                )
                .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| Error::Database(format!("failed to list collections: {e}")))?;

            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::Database(format!("failed to read collection row: {e}")))
        })
    }

    async fn has_collection(&self, name: &str) -> Result<bool> {
        self.with_conn(|conn| table_exists(conn, name))
    }

    async fn create_collection(&self, name: &str) -> Result<()> {
        validate_collection_name(name)?;
        self.with_conn(|conn| {
            if table_exists(conn, name)? {
                return Err(Error::Database(format!("collection {name} already exists")));
            }
            ensure_table(conn, name)?;
            debug!("created collection {name}");
            Ok(())
        })
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        validate_collection_name(name)?;
        self.with_conn(|conn| {
            if !table_exists(conn, name)? {
                return Err(Error::Database(format!("collection {name} does not exist")));
            }
            conn.execute_batch(&format!("DROP TABLE [{name}]"))
                .map_err(|e| Error::Database(format!("failed to drop collection {name}: {e}")))?;
            debug!("dropped collection {name}");
            Ok(())
        })
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<String> {
        validate_collection_name(collection)?;
        if index.keys.is_empty() {
            return Err(Error::Database(format!(
                "index on {collection} needs at least one key"
            )));
        }
        for key in &index.keys {
            validate_field_name(key)?;
        }
        let index_name = index
            .name
            .clone()
            .unwrap_or_else(|| format!("{collection}_{}", index.keys.join("_")));
        validate_collection_name(&index_name)?;

        let columns = index
            .keys
            .iter()
            .map(|key| format!("json_extract(doc, '$.{key}')"))
            .collect::<Vec<_>>()
            .join(", ");
        let unique = if index.unique { "UNIQUE " } else { "" };
        let sql =
            format!("CREATE {unique}INDEX IF NOT EXISTS [{index_name}] ON [{collection}] ({columns})");

        self.with_conn(|conn| {
            ensure_table(conn, collection)?;
            conn.execute_batch(&sql)
                .map_err(|e| write_error(collection, "create index", e))?;
            debug!("created index {index_name} on {collection}");
            Ok(index_name.clone())
        })
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<()> {
        validate_collection_name(collection)?;
        let json = serde_json::to_string(&document)?;
        self.with_conn(|conn| {
            ensure_table(conn, collection)?;
            conn.execute(
                &format!("INSERT INTO [{collection}] (doc) VALUES (?1)"),
                params![json],
            )
            .map_err(|e| write_error(collection, "insert document", e))?;
            Ok(())
        })
    }

    async fn find(&self, collection: &str, filter: &Document) -> Result<Vec<Document>> {
        validate_collection_name(collection)?;
        self.with_conn(|conn| {
            Ok(matching_rows(conn, collection, filter)?
                .into_iter()
                .map(|(_, doc)| doc)
                .collect())
        })
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Document,
        set: &Document,
    ) -> Result<u64> {
        validate_collection_name(collection)?;
        self.with_conn(|conn| {
            let rows = matching_rows(conn, collection, filter)?;
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| Error::Database(format!("failed to begin transaction: {e}")))?;
            for (id, mut doc) in rows.iter().cloned() {
                for (key, value) in set {
                    doc.insert(key.clone(), value.clone());
                }
                let json = serde_json::to_string(&doc)?;
                tx.execute(
                    &format!("UPDATE [{collection}] SET doc = ?1 WHERE id = ?2"),
                    params![json, id],
                )
                .map_err(|e| write_error(collection, "update document", e))?;
            }
            tx.commit()
                .map_err(|e| Error::Database(format!("failed to commit update: {e}")))?;
            Ok(rows.len() as u64)
        })
    }

    async fn delete_many(&self, collection: &str, filter: &Document) -> Result<u64> {
        validate_collection_name(collection)?;
        self.with_conn(|conn| {
            let rows = matching_rows(conn, collection, filter)?;
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| Error::Database(format!("failed to begin transaction: {e}")))?;
            for (id, _) in &rows {
                tx.execute(
                    &format!("DELETE FROM [{collection}] WHERE id = ?1"),
                    params![id],
                )
                .map_err(|e| write_error(collection, "delete document", e))?;
            }
            tx.commit()
                .map_err(|e| Error::Database(format!("failed to commit delete: {e}")))?;
            Ok(rows.len() as u64)
        })
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| Error::Database("document store lock poisoned".into()))?;
        if let Some(conn) = guard.take() {
            conn.close()
                .map_err(|(_, e)| Error::Database(format!("failed to close database: {e}")))?;
            debug!("closed database {}", self.name);
        }
        Ok(())
    }
}

fn resolve_location(url: &str) -> Result<Location> {
    if url == MEMORY_URL {
        return Ok(Location::Memory);
    }
    if let Some(dir) = url.strip_prefix("sqlite://") {
        if dir.is_empty() {
            return Err(Error::Config(format!("connection url {url} has no path")));
        }
        return Ok(Location::Directory(PathBuf::from(dir)));
    }
    if url.contains("://") {
        let parsed =
            Url::parse(url).map_err(|e| Error::Config(format!("invalid connection url: {e}")))?;
        if parsed.scheme() != "file" {
            return Err(Error::Config(format!(
                "unsupported connection scheme: {}",
                parsed.scheme()
            )));
        }
        let dir = parsed
            .to_file_path()
            .map_err(|_| Error::Config(format!("connection url {url} is not a local path")))?;
        return Ok(Location::Directory(dir));
    }
    Ok(Location::Directory(PathBuf::from(url)))
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    conn.query_row(
        "SELECT count(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![name],
        |row| row.get(0),
    )
    .map_err(|e| Error::Database(format!("failed to check collection {name}: {e}")))
}

fn ensure_table(conn: &Connection, name: &str) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS [{name}] (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            doc TEXT NOT NULL
        )"
    ))
    .map_err(|e| Error::Database(format!("failed to create collection {name}: {e}")))
}

fn matching_rows(
    conn: &Connection,
    collection: &str,
    filter: &Document,
) -> Result<Vec<(i64, Document)>> {
    if !table_exists(conn, collection)? {
        return Ok(Vec::new());
    }

    let mut stmt = conn
        .prepare(&format!("SELECT id, doc FROM [{collection}] ORDER BY id ASC"))
        .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
        .map_err(|e| Error::Database(format!("failed to query {collection}: {e}")))?;

    let mut matched = Vec::new();
    for row in rows {
        let (id, json) =
            row.map_err(|e| Error::Database(format!("failed to read document row: {e}")))?;
        let doc: Document = serde_json::from_str(&json)?;
        if matches_filter(&doc, filter) {
            matched.push((id, doc));
        }
    }
    Ok(matched)
}

fn write_error(collection: &str, action: &str, e: rusqlite::Error) -> Error {
    match e {
        rusqlite::Error::SqliteFailure(err, detail) if err.code == ErrorCode::ConstraintViolation => {
            Error::DuplicateKey {
                collection: collection.to_string(),
                detail: detail.unwrap_or_else(|| err.to_string()),
            }
        }
        other => Error::Database(format!("failed to {action} in {collection}: {other}")),
    }
}

fn validate_database_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\', '\0']) || name.starts_with('.') {
        return Err(Error::Config(format!("invalid database name: {name:?}")));
    }
    Ok(())
}

fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.len() > 120
        || name.contains([']', '\0'])
        || name.to_ascii_lowercase().starts_with("sqlite_")
    {
        return Err(Error::Database(format!("invalid collection name: {name:?}")));
    }
    Ok(())
}

fn validate_field_name(name: &str) -> Result<()> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(Error::Database(format!("invalid index key: {name:?}")));
    }
    Ok(())
}
