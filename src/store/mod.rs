//! Document store boundary: fetch-by-id, full-document upsert and source text lookup.

mod elasticsearch;
mod memory;
mod sqlite;

pub use elasticsearch::ElasticsearchStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::{LoctextError, Result};

/// A stored document body
pub type Document = Map<String, Value>;

/// Optimistic-concurrency token of a stored document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revision {
    pub seq_no: u64,
    pub primary_term: u64,
}

/// A document as read from the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub source: Document,
    pub revision: Option<Revision>,
}

/// Persistence primitives the pipeline relies on
///
/// Each backend is bound to one collection and document type.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document, `None` when absent
    async fn get(&self, id: &str) -> Result<Option<StoredDocument>>;

    /// Write the full document under `id`
    ///
    /// With `expected` set, the write only succeeds if the stored revision is
    /// still `expected`; otherwise it fails with `VersionConflict`.
    async fn index(&self, id: &str, document: &Document, expected: Option<Revision>) -> Result<()>;

    /// Stored full text of a document
    async fn source_text(&self, id: &str) -> Result<String> {
        let stored = self
            .get(id)
            .await?
            .ok_or_else(|| LoctextError::DocumentNotFound(id.to_string()))?;
        extract_text(&stored.source).map(String::from).ok_or_else(|| {
            LoctextError::InvalidInput(format!("Document {} has no text field", id))
        })
    }
}

/// The `text` field, either a plain string or an object with a `text` string
pub fn extract_text(source: &Document) -> Option<&str> {
    match source.get("text")? {
        Value::String(text) => Some(text),
        Value::Object(inner) => inner.get("text")?.as_str(),
        _ => None,
    }
}

/// Open the configured backend
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>> {
    match config.backend {
        StoreBackend::Elasticsearch => Ok(Arc::new(ElasticsearchStore::from_config(config)?)),
        StoreBackend::Sqlite => Ok(Arc::new(SqliteStore::open(config).await?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_extract_text_plain_string() {
        let source = doc(json!({"text": "TP53 in nucleus", "title": "x"}));
        assert_eq!(extract_text(&source), Some("TP53 in nucleus"));
    }

    #[test]
    fn test_extract_text_nested_object() {
        let source = doc(json!({"text": {"text": "TP53 in nucleus", "lang": "en"}}));
        assert_eq!(extract_text(&source), Some("TP53 in nucleus"));
    }

    #[test]
    fn test_extract_text_missing() {
        assert_eq!(extract_text(&doc(json!({"title": "x"}))), None);
        assert_eq!(extract_text(&doc(json!({"text": 5}))), None);
        assert_eq!(extract_text(&doc(json!({"text": {"body": "x"}}))), None);
    }

    #[tokio::test]
    async fn test_default_source_text_uses_get() {
        let store = MemoryStore::new();
        store.insert("1", doc(json!({"text": {"text": "abc"}})));

        assert_eq!(store.source_text("1").await.unwrap(), "abc");
        let err = store.source_text("2").await.unwrap_err();
        assert!(matches!(err, LoctextError::DocumentNotFound(_)));
    }
}
