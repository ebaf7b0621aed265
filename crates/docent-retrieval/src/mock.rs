//! Scriptable [`RetrievalClient`] for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::RetrievalClient;
use crate::errors::{Result, RetrievalError};
use crate::types::SearchResult;

/// Test double returning canned results and counting calls.
///
/// Semantic and keyword queries return their scripted lists truncated to
/// `k`. A scripted failure applies to both query kinds; ingestion has its
/// own failure slot.
#[derive(Default)]
pub struct MockRetrievalClient {
    semantic: Mutex<Vec<SearchResult>>,
    keyword: Mutex<Vec<SearchResult>>,
    query_failure: Mutex<Option<RetrievalError>>,
    ingest_failure: Mutex<Option<RetrievalError>>,
    delay: Mutex<Option<Duration>>,
    indexed: Mutex<HashMap<String, String>>,
    query_calls: AtomicUsize,
    keyword_calls: AtomicUsize,
    ingest_calls: AtomicUsize,
}

impl MockRetrievalClient {
    /// Empty mock: no results, no failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script semantic results.
    #[must_use]
    pub fn with_semantic(self, results: Vec<SearchResult>) -> Self {
        *self.semantic.lock() = results;
        self
    }

    /// Script keyword results.
    #[must_use]
    pub fn with_keyword(self, results: Vec<SearchResult>) -> Self {
        *self.keyword.lock() = results;
        self
    }

    /// Make every subsequent query fail with `err`.
    pub fn fail_queries(&self, err: RetrievalError) {
        *self.query_failure.lock() = Some(err);
    }

    /// Make every subsequent ingest fail with `err`.
    pub fn fail_ingest(&self, err: RetrievalError) {
        *self.ingest_failure.lock() = Some(err);
    }

    /// Sleep before answering each call.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Semantic queries made so far.
    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    /// Keyword queries made so far.
    pub fn keyword_calls(&self) -> usize {
        self.keyword_calls.load(Ordering::SeqCst)
    }

    /// Ingest calls made so far.
    pub fn ingest_calls(&self) -> usize {
        self.ingest_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = *self.delay.lock();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
    }

    fn answer(&self, list: &Mutex<Vec<SearchResult>>, k: usize) -> Result<Vec<SearchResult>> {
        if let Some(err) = self.query_failure.lock().clone() {
            return Err(err);
        }
        Ok(list.lock().iter().take(k).cloned().collect())
    }
}

#[async_trait]
impl RetrievalClient for MockRetrievalClient {
    async fn ingest(&self, document_id: &str, _pages: &[String], fingerprint: &str) -> Result<()> {
        let _ = self.ingest_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if let Some(err) = self.ingest_failure.lock().clone() {
            return Err(err);
        }
        let _ = self
            .indexed
            .lock()
            .insert(document_id.to_string(), fingerprint.to_string());
        Ok(())
    }

    async fn is_indexed(&self, document_id: &str, fingerprint: &str) -> Result<bool> {
        Ok(self
            .indexed
            .lock()
            .get(document_id)
            .is_some_and(|fp| fp == fingerprint))
    }

    async fn query(&self, _text: &str, k: usize) -> Result<Vec<SearchResult>> {
        let _ = self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.answer(&self.semantic, k)
    }

    async fn keyword_query(&self, _text: &str, k: usize) -> Result<Vec<SearchResult>> {
        let _ = self.keyword_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.answer(&self.keyword, k)
    }
}
