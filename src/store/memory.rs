use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{Document, DocumentStore, Revision, StoredDocument};
use crate::error::{LoctextError, Result};

/// In-process document store for tests and dry runs
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, (Document, u64)>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document without counting it as a pipeline write
    pub fn insert(&self, id: &str, document: Document) {
        if let Ok(mut docs) = self.docs.lock() {
            let version = docs.get(id).map(|(_, v)| v + 1).unwrap_or(1);
            docs.insert(id.to_string(), (document, version));
        }
    }

    /// Current body of a document
    pub fn document(&self, id: &str) -> Option<Document> {
        self.docs.lock().ok()?.get(id).map(|(doc, _)| doc.clone())
    }

    /// Number of `index` calls that reached the store
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn poisoned() -> LoctextError {
        LoctextError::StoreUnavailable("memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<StoredDocument>> {
        let docs = self.docs.lock().map_err(|_| Self::poisoned())?;
        Ok(docs.get(id).map(|(source, version)| StoredDocument {
            id: id.to_string(),
            source: source.clone(),
            revision: Some(Revision {
                seq_no: *version,
                primary_term: 1,
            }),
        }))
    }

    async fn index(&self, id: &str, document: &Document, expected: Option<Revision>) -> Result<()> {
        let mut docs = self.docs.lock().map_err(|_| Self::poisoned())?;
        let current = docs.get(id).map(|(_, v)| *v);

        if let Some(expected) = expected {
            if current != Some(expected.seq_no) {
                return Err(LoctextError::VersionConflict(id.to_string()));
            }
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        docs.insert(id.to_string(), (document.clone(), current.unwrap_or(0) + 1));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(title: &str) -> Document {
        json!({"title": title}).as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = MemoryStore::new();
        assert!(store.get("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_index_bumps_revision() {
        let store = MemoryStore::new();
        store.insert("1", doc("a"));
        let before = store.get("1").await.unwrap().unwrap().revision.unwrap();

        store.index("1", &doc("b"), Some(before)).await.unwrap();
        let after = store.get("1").await.unwrap().unwrap();

        assert_eq!(after.source, doc("b"));
        assert_eq!(after.revision.unwrap().seq_no, before.seq_no + 1);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_revision_conflicts() {
        let store = MemoryStore::new();
        store.insert("1", doc("a"));
        let stale = store.get("1").await.unwrap().unwrap().revision;
        store.index("1", &doc("b"), None).await.unwrap();

        let err = store.index("1", &doc("c"), stale).await.unwrap_err();
        assert!(matches!(err, LoctextError::VersionConflict(_)));
        assert_eq!(store.document("1"), Some(doc("b")));
    }
}
