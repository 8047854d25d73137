use async_trait::async_trait;
use docmigrate_common::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored document: a JSON object.
pub type Document = Map<String, Value>;

/// Description of a secondary index over top-level document fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub keys: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub name: Option<String>,
}

impl IndexSpec {
    pub fn unique(keys: &[&str]) -> Self {
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            unique: true,
            name: None,
        }
    }
}

/// Handle to a document database. This is what migration procedures receive
/// and what the ledger persists into.
///
/// Filters are JSON objects whose top-level entries must all equal the
/// corresponding document fields. An empty filter matches every document.
/// Collections are created implicitly by inserts and index creation, and
/// reads from a missing collection return nothing.
#[async_trait]
pub trait Database: Send + Sync {
    /// Name of the database this handle is bound to.
    fn name(&self) -> &str;

    async fn list_collections(&self) -> Result<Vec<String>>;

    async fn has_collection(&self, name: &str) -> Result<bool> {
        Ok(self.list_collections().await?.iter().any(|c| c == name))
    }

    /// Create an empty collection. Fails if it already exists.
    async fn create_collection(&self, name: &str) -> Result<()>;

    /// Drop a collection and its indexes. Fails if it does not exist.
    async fn drop_collection(&self, name: &str) -> Result<()>;

    /// Create an index and return its name. Creating the same index twice is a
    /// no-op.
    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<String>;

    async fn insert_one(&self, collection: &str, document: Document) -> Result<()>;

    /// Matching documents in insertion order.
    async fn find(&self, collection: &str, filter: &Document) -> Result<Vec<Document>>;

    /// Merge `set` into every matching document; returns the number updated.
    async fn update_many(&self, collection: &str, filter: &Document, set: &Document)
    -> Result<u64>;

    /// Remove every matching document; returns the number removed.
    async fn delete_many(&self, collection: &str, filter: &Document) -> Result<u64>;

    /// Release the underlying connection. Later calls fail.
    async fn close(&self) -> Result<()>;
}

/// Equality match of every filter entry against the document. A `null` filter
/// value also matches a missing field.
pub fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| match document.get(key) {
        Some(actual) => actual == expected,
        None => expected.is_null(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(matches_filter(&doc(json!({"a": 1})), &Document::new()));
    }

    #[test]
    fn filter_requires_every_field() {
        let d = doc(json!({"migration": "0001-a.yml", "batch": 1}));
        assert!(matches_filter(&d, &doc(json!({"migration": "0001-a.yml"}))));
        assert!(matches_filter(
            &d,
            &doc(json!({"migration": "0001-a.yml", "batch": 1}))
        ));
        assert!(!matches_filter(
            &d,
            &doc(json!({"migration": "0001-a.yml", "batch": 2}))
        ));
    }

    #[test]
    fn null_filter_matches_missing_field() {
        let d = doc(json!({"a": 1}));
        assert!(matches_filter(&d, &doc(json!({"b": null}))));
        assert!(!matches_filter(&d, &doc(json!({"a": null}))));
    }

    #[test]
    fn index_spec_deserializes_with_defaults() {
        let spec: IndexSpec = serde_json::from_value(json!({"keys": ["provider"]})).unwrap();
        assert!(!spec.unique);
        assert!(spec.name.is_none());
    }
}
