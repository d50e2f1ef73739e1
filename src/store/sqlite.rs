use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use std::path::Path;

use super::{Document, DocumentStore, Revision, StoredDocument};
use crate::config::StoreConfig;
use crate::db::{migrate, Db};
use crate::error::{LoctextError, Result};

/// Local SQLite backend holding JSON document bodies
///
/// Calls are bounded by the connection busy timeout; a call that cannot take
/// the lock in time fails without writing.
pub struct SqliteStore {
    db: Db,
    collection: String,
    document_type: String,
}

impl SqliteStore {
    /// Open the database and apply pending migrations
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let store = Self::new(
            Db::new(&config.db_path).with_busy_timeout(config.timeout()),
            &config.collection,
            &config.document_type,
        );
        store.migrate(&config.migrations_dir).await?;
        Ok(store)
    }

    pub fn new(db: Db, collection: &str, document_type: &str) -> Self {
        Self {
            db,
            collection: collection.to_string(),
            document_type: document_type.to_string(),
        }
    }

    pub async fn migrate(&self, migrations_dir: &Path) -> Result<()> {
        let migrations_dir = migrations_dir.to_path_buf();
        self.db
            .with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
            .await
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, id: &str) -> Result<Option<StoredDocument>> {
        let collection = self.collection.clone();
        let doc_type = self.document_type.clone();
        let doc_id = id.to_string();

        let row = self
            .db
            .with_connection(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT body, version FROM documents \
                         WHERE collection = ?1 AND doc_type = ?2 AND doc_id = ?3",
                        params![collection, doc_type, doc_id],
                        |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;

        let Some((body, version)) = row else {
            return Ok(None);
        };

        let source: Document = serde_json::from_str(&body)?;
        Ok(Some(StoredDocument {
            id: id.to_string(),
            source,
            revision: Some(Revision {
                seq_no: version as u64,
                primary_term: 1,
            }),
        }))
    }

    async fn index(&self, id: &str, document: &Document, expected: Option<Revision>) -> Result<()> {
        let collection = self.collection.clone();
        let doc_type = self.document_type.clone();
        let doc_id = id.to_string();
        let body = serde_json::to_string(document)?;

        let written = self
            .db
            .with_connection(move |conn| {
                let changed = match expected {
                    Some(revision) => conn.execute(
                        "UPDATE documents SET body = ?4, version = version + 1, \
                         updated_at = CURRENT_TIMESTAMP \
                         WHERE collection = ?1 AND doc_type = ?2 AND doc_id = ?3 AND version = ?5",
                        params![collection, doc_type, doc_id, body, revision.seq_no as i64],
                    )?,
                    None => conn.execute(
                        r#"
                        INSERT INTO documents (collection, doc_type, doc_id, body)
                        VALUES (?1, ?2, ?3, ?4)
                        ON CONFLICT(collection, doc_type, doc_id) DO UPDATE SET
                            body = excluded.body,
                            version = documents.version + 1,
                            updated_at = CURRENT_TIMESTAMP
                        "#,
                        params![collection, doc_type, doc_id, body],
                    )?,
                };
                Ok(changed > 0)
            })
            .await?;

        if !written {
            return Err(LoctextError::VersionConflict(id.to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(temp_dir: &TempDir, timeout_secs: u64) -> StoreConfig {
        StoreConfig {
            backend: crate::config::StoreBackend::Sqlite,
            db_path: temp_dir.path().join("docs.db"),
            migrations_dir: Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
            timeout_secs,
            ..StoreConfig::default()
        }
    }

    async fn store(temp_dir: &TempDir) -> SqliteStore {
        SqliteStore::open(&config(temp_dir, 5)).await.unwrap()
    }

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().unwrap().clone()
    }

    /// Hold the write lock from another connection for `hold`; returns once it is taken
    fn hold_write_lock(path: std::path::PathBuf, hold: Duration) -> thread::JoinHandle<()> {
        let (locked_tx, locked_rx) = mpsc::channel();
        let holder = thread::spawn(move || {
            let conn = rusqlite::Connection::open(path).unwrap();
            conn.execute_batch("BEGIN IMMEDIATE").unwrap();
            locked_tx.send(()).unwrap();
            thread::sleep(hold);
            conn.execute_batch("ROLLBACK").unwrap();
        });
        locked_rx.recv().unwrap();
        holder
    }

    #[tokio::test]
    async fn test_index_then_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;

        assert!(store.get("1").await.unwrap().is_none());
        store.index("1", &doc(json!({"text": "TP53"})), None).await.unwrap();

        let stored = store.get("1").await.unwrap().unwrap();
        assert_eq!(stored.source["text"], "TP53");
        assert_eq!(stored.revision, Some(Revision { seq_no: 1, primary_term: 1 }));
        assert_eq!(store.source_text("1").await.unwrap(), "TP53");
    }

    #[tokio::test]
    async fn test_conditional_write() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;
        store.index("1", &doc(json!({"v": 1})), None).await.unwrap();
        let read = store.get("1").await.unwrap().unwrap().revision;

        store.index("1", &doc(json!({"v": 2})), read).await.unwrap();
        let err = store.index("1", &doc(json!({"v": 3})), read).await.unwrap_err();

        assert!(matches!(err, LoctextError::VersionConflict(_)));
        assert_eq!(store.get("1").await.unwrap().unwrap().source["v"], 2);
    }

    #[tokio::test]
    async fn test_conditional_write_on_missing_document_conflicts() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;
        let revision = Some(Revision { seq_no: 1, primary_term: 1 });

        let err = store.index("ghost", &doc(json!({})), revision).await.unwrap_err();
        assert!(matches!(err, LoctextError::VersionConflict(_)));
        assert!(store.get("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let temp_dir = TempDir::new().unwrap();
        let pubmed = store(&temp_dir).await;
        let other = SqliteStore::new(Db::new(temp_dir.path().join("docs.db")), "pmc", "paper");

        pubmed.index("1", &doc(json!({"text": "a"})), None).await.unwrap();
        assert!(other.get("1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_locked_write_times_out_without_landing() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&config(&temp_dir, 1)).await.unwrap();
        store.index("1", &doc(json!({"v": 0})), None).await.unwrap();

        let holder = hold_write_lock(temp_dir.path().join("docs.db"), Duration::from_secs(3));
        let err = store.index("1", &doc(json!({"v": 1})), None).await.unwrap_err();
        holder.join().unwrap();

        assert_eq!(err.kind(), "StoreUnavailable");
        let stored = store.get("1").await.unwrap().unwrap();
        assert_eq!(stored.source["v"], 0);
        assert_eq!(stored.revision.unwrap().seq_no, 1);
    }

    #[tokio::test]
    async fn test_write_waits_for_short_lock() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&config(&temp_dir, 5)).await.unwrap();
        store.index("1", &doc(json!({"v": 0})), None).await.unwrap();

        let holder = hold_write_lock(temp_dir.path().join("docs.db"), Duration::from_millis(300));
        store.index("1", &doc(json!({"v": 1})), None).await.unwrap();
        holder.join().unwrap();

        assert_eq!(store.get("1").await.unwrap().unwrap().source["v"], 1);
    }
}
