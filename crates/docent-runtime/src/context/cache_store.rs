//! Persistent storage behind the context cache.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use docent_core::{ContextType, DocumentContext};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::CacheError;

/// Identity of a cached context.
///
/// Whole-document types key on `(document_id, context_type)`; page ranges
/// add the page list so different ranges of one document do not collide.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Document ID.
    pub document_id: String,
    /// Context type.
    pub context_type: ContextType,
    /// Pages of a `pageRange` context.
    pub pages: Option<Vec<u32>>,
}

impl CacheKey {
    /// Key for a whole-document context.
    pub fn document(document_id: impl Into<String>, context_type: ContextType) -> Self {
        Self {
            document_id: document_id.into(),
            context_type,
            pages: None,
        }
    }

    /// Key for a page range.
    pub fn pages(document_id: impl Into<String>, pages: Vec<u32>) -> Self {
        Self {
            document_id: document_id.into(),
            context_type: ContextType::PageRange,
            pages: Some(pages),
        }
    }

    /// Flat string form used as the storage primary key.
    pub fn storage_key(&self) -> String {
        match &self.pages {
            None => format!("{}|{}", self.document_id, self.context_type),
            Some(pages) => {
                let list: Vec<String> = pages.iter().map(u32::to_string).collect();
                format!("{}|{}|{}", self.document_id, self.context_type, list.join(","))
            }
        }
    }
}

/// A cached context plus the source fingerprint it was extracted from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// The extracted context, every field included.
    pub context: DocumentContext,
    /// [`DocumentSource::fingerprint`](super::source::DocumentSource::fingerprint)
    /// at extraction time.
    pub source_fingerprint: String,
}

/// Backing store of the context cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch an entry. `Err(CacheError::Corrupt)` when it cannot be decoded.
    async fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;

    /// Insert or overwrite an entry.
    async fn save(&self, key: &CacheKey, entry: &CacheEntry) -> Result<(), CacheError>;

    /// Delete one entry.
    async fn remove(&self, key: &CacheKey) -> Result<(), CacheError>;

    /// Delete every entry of a document.
    async fn remove_document(&self, document_id: &str) -> Result<(), CacheError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite
// ─────────────────────────────────────────────────────────────────────────────

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS context_cache (
    key TEXT PRIMARY KEY,
    document_id TEXT NOT NULL,
    payload TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_context_cache_document ON context_cache(document_id);
";

/// [`CacheStore`] over a single `SQLite` connection.
///
/// Entries are JSON payloads. Every statement runs on the blocking pool.
#[derive(Clone)]
pub struct SqliteCacheStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCacheStore {
    /// Open (or create) the database file and its schema.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")?;
        Self::with_connection(conn)
    }

    /// Private in-memory database.
    pub fn in_memory() -> Result<Self, CacheError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, f: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, CacheError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&conn.lock()))
            .await
            .map_err(|e| CacheError::Storage(e.to_string()))?
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let storage_key = key.storage_key();
        self.run(move |conn| {
            let payload: Option<String> = conn
                .query_row(
                    "SELECT payload FROM context_cache WHERE key = ?1",
                    params![storage_key],
                    |row| row.get(0),
                )
                .optional()?;
            payload
                .map(|raw| {
                    serde_json::from_str(&raw).map_err(|e| CacheError::Corrupt {
                        key: storage_key.clone(),
                        message: e.to_string(),
                    })
                })
                .transpose()
        })
        .await
    }

    async fn save(&self, key: &CacheKey, entry: &CacheEntry) -> Result<(), CacheError> {
        let storage_key = key.storage_key();
        let document_id = key.document_id.clone();
        let payload =
            serde_json::to_string(entry).map_err(|e| CacheError::Storage(e.to_string()))?;
        self.run(move |conn| {
            let _ = conn.execute(
                "INSERT INTO context_cache (key, document_id, payload, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET payload = excluded.payload,
                                                updated_at = excluded.updated_at",
                params![
                    storage_key,
                    document_id,
                    payload,
                    chrono::Utc::now().to_rfc3339()
                ],
            )?;
            debug!(key = %storage_key, "cache entry persisted");
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), CacheError> {
        let storage_key = key.storage_key();
        self.run(move |conn| {
            let _ = conn.execute(
                "DELETE FROM context_cache WHERE key = ?1",
                params![storage_key],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove_document(&self, document_id: &str) -> Result<(), CacheError> {
        let document_id = document_id.to_string();
        self.run(move |conn| {
            let _ = conn.execute(
                "DELETE FROM context_cache WHERE document_id = ?1",
                params![document_id],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn entry(document_id: &str) -> CacheEntry {
        CacheEntry {
            context: DocumentContext::new(
                document_id,
                "Title",
                ContextType::FullDocument,
                "body text",
                "text",
                3,
            )
            .with_pages(vec![1, 2]),
            source_fingerprint: "fp".into(),
        }
    }

    #[test]
    fn storage_keys() {
        assert_eq!(
            CacheKey::document("d", ContextType::FullDocument).storage_key(),
            "d|fullDocument"
        );
        assert_eq!(
            CacheKey::pages("d", vec![2, 3]).storage_key(),
            "d|pageRange|2,3"
        );
    }

    #[tokio::test]
    async fn save_then_load_round_trips_every_field() {
        let store = SqliteCacheStore::in_memory().unwrap();
        let key = CacheKey::document("d", ContextType::FullDocument);
        let saved = entry("d");
        store.save(&key, &saved).await.unwrap();
        let loaded = store.load(&key).await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.context.checksum(), saved.context.checksum());
    }

    #[tokio::test]
    async fn save_overwrites() {
        let store = SqliteCacheStore::in_memory().unwrap();
        let key = CacheKey::document("d", ContextType::FullDocument);
        store.save(&key, &entry("d")).await.unwrap();
        let mut newer = entry("d");
        newer.source_fingerprint = "fp2".into();
        store.save(&key, &newer).await.unwrap();
        assert_eq!(
            store.load(&key).await.unwrap().unwrap().source_fingerprint,
            "fp2"
        );
    }

    #[tokio::test]
    async fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let key = CacheKey::pages("d", vec![1]);
        {
            let store = SqliteCacheStore::open(&path).unwrap();
            store.save(&key, &entry("d")).await.unwrap();
        }
        let store = SqliteCacheStore::open(&path).unwrap();
        assert!(store.load(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn malformed_payload_is_corrupt() {
        let store = SqliteCacheStore::in_memory().unwrap();
        let key = CacheKey::document("d", ContextType::Reference);
        let _ = store
            .conn
            .lock()
            .execute(
                "INSERT INTO context_cache (key, document_id, payload, updated_at)
                 VALUES (?1, 'd', '{not json', 'now')",
                params![key.storage_key()],
            )
            .unwrap();
        assert_matches!(store.load(&key).await, Err(CacheError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn remove_document_drops_all_its_keys() {
        let store = SqliteCacheStore::in_memory().unwrap();
        let full = CacheKey::document("d", ContextType::FullDocument);
        let page = CacheKey::pages("d", vec![1]);
        let other = CacheKey::document("e", ContextType::FullDocument);
        for k in [&full, &page, &other] {
            store.save(k, &entry(&k.document_id)).await.unwrap();
        }
        store.remove_document("d").await.unwrap();
        assert!(store.load(&full).await.unwrap().is_none());
        assert!(store.load(&page).await.unwrap().is_none());
        assert!(store.load(&other).await.unwrap().is_some());

        store.remove(&other).await.unwrap();
        assert!(store.load(&other).await.unwrap().is_none());
    }
}
