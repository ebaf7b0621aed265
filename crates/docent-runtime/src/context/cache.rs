//! Shared context cache.
//!
//! Memory tier in a `DashMap`, optional persistent tier behind
//! [`CacheStore`]. Entries are shared by `Arc` across sessions and live
//! until they go stale, not until a session ends. Writes are
//! last-writer-wins per key. A stale entry leaves the memory tier when a
//! lookup finds it, and every write sweeps out entries past `max_age`.
//!
//! Storage failures never reach callers: a corrupt or unreadable entry is
//! a miss, and persistence runs in a detached task.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use docent_settings::CacheSettings;
use metrics::counter;
use tracing::{debug, warn};

use crate::context::cache_store::{CacheEntry, CacheKey, CacheStore};
use crate::errors::CacheError;

/// TTL-bounded cache of extracted contexts.
pub struct ContextCache {
    entries: DashMap<CacheKey, Arc<CacheEntry>>,
    store: Option<Arc<dyn CacheStore>>,
    max_age: chrono::Duration,
}

impl ContextCache {
    /// Memory-only cache.
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            store: None,
            max_age: chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Cache configured from settings, persisting to `store` if given.
    pub fn from_settings(settings: &CacheSettings, store: Option<Arc<dyn CacheStore>>) -> Self {
        let cache = Self::new(Duration::from_secs(settings.max_age_secs));
        match store {
            Some(store) => cache.with_store(store),
            None => cache,
        }
    }

    /// Attach a persistent tier.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Maximum entry age.
    pub fn max_age(&self) -> chrono::Duration {
        self.max_age
    }

    /// Entries held in memory.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the memory tier is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fresh entry for `key`, if any.
    ///
    /// An entry is fresh when it is younger than `max_age` at `now` and was
    /// extracted from a source whose fingerprint still equals
    /// `fingerprint`.
    pub async fn get(
        &self,
        key: &CacheKey,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Option<Arc<CacheEntry>> {
        let cached = self.entries.get(key).map(|e| Arc::clone(e.value()));
        let entry = match cached {
            Some(entry) => Some(entry),
            None => self.load_persisted(key).await,
        };

        match entry {
            Some(entry) if self.is_fresh(&entry, fingerprint, now) => {
                counter!("docent_cache_hits_total").increment(1);
                Some(entry)
            }
            Some(stale) => {
                debug!(key = %key.storage_key(), "cache entry stale");
                let _ = self
                    .entries
                    .remove_if(key, |_, cached| Arc::ptr_eq(cached, &stale));
                counter!("docent_cache_misses_total").increment(1);
                None
            }
            None => {
                counter!("docent_cache_misses_total").increment(1);
                None
            }
        }
    }

    /// Store `entry` under `key`. Persistence does not block the caller.
    pub fn put(&self, key: CacheKey, entry: CacheEntry) {
        let now = Utc::now();
        self.entries
            .retain(|_, cached| cached.context.age(now) < self.max_age);
        let entry = Arc::new(entry);
        if let Some(store) = &self.store {
            Self::spawn_persist(Arc::clone(store), key.clone(), Arc::clone(&entry));
        }
        let _ = self.entries.insert(key, entry);
    }

    /// Drop every entry of a document from both tiers.
    pub fn invalidate(&self, document_id: &str) {
        self.entries.retain(|k, _| k.document_id != document_id);
        if let (Some(store), Ok(handle)) = (&self.store, tokio::runtime::Handle::try_current()) {
            let store = Arc::clone(store);
            let document_id = document_id.to_string();
            let _handle = handle.spawn(async move {
                if let Err(e) = store.remove_document(&document_id).await {
                    warn!(document_id, error = %e, "failed to drop persisted cache entries");
                }
            });
        }
    }

    fn is_fresh(&self, entry: &CacheEntry, fingerprint: &str, now: DateTime<Utc>) -> bool {
        entry.source_fingerprint == fingerprint && entry.context.age(now) < self.max_age
    }

    async fn load_persisted(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        let store = self.store.as_ref()?;
        match store.load(key).await {
            Ok(Some(entry)) => {
                let entry = Arc::new(entry);
                let _ = self.entries.insert(key.clone(), Arc::clone(&entry));
                Some(entry)
            }
            Ok(None) => None,
            Err(CacheError::Corrupt { key: storage_key, message }) => {
                warn!(key = %storage_key, error = %message, "corrupt cache entry, discarding");
                if let Err(e) = store.remove(key).await {
                    debug!(error = %e, "failed to remove corrupt cache entry");
                }
                None
            }
            Err(e) => {
                warn!(key = %key.storage_key(), error = %e, "cache read failed");
                None
            }
        }
    }

    fn spawn_persist(store: Arc<dyn CacheStore>, key: CacheKey, entry: Arc<CacheEntry>) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(key = %key.storage_key(), "no runtime, skipping cache persistence");
            return;
        };
        let _handle = handle.spawn(async move {
            if let Err(e) = store.save(&key, &entry).await {
                warn!(key = %key.storage_key(), error = %e, "failed to persist cache entry");
            }
        });
    }
}
