//! Indexer: keeps the keyword and vector indexes in step with the chunk store

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::keyword::KeywordIndex;
use super::vector::VectorIndex;
use crate::config::SpecScopeConfig;
use crate::embeddings::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::types::Chunk;

/// Bounded exponential backoff for transient index failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Run `op`, retrying only errors that report themselves as transient
    pub async fn run<F, Fut, T>(&self, what: &str, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.base_delay * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        what,
                        attempt,
                        attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Outcome of indexing one document's chunks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub keyword_indexed: usize,
    pub vector_indexed: usize,
}

/// Owns both sub-indexes and the embedding cache
pub struct Indexer {
    keyword: KeywordIndex,
    vector: VectorIndex,
    embedder: Arc<dyn EmbeddingProvider>,
    /// Chunk text hash -> embedding
    embedding_cache: DashMap<String, Vec<f32>>,
    retry: RetryPolicy,
    parallel_embeddings: usize,
}

impl Indexer {
    pub fn new(config: &SpecScopeConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            keyword: KeywordIndex::new(config.retrieval.bm25_k1, config.retrieval.bm25_b),
            vector: VectorIndex::new(embedder.dimensions()),
            embedder,
            embedding_cache: DashMap::new(),
            retry: RetryPolicy {
                attempts: config.processing.index_retry_attempts,
                base_delay: Duration::from_millis(config.processing.index_retry_base_ms),
            },
            parallel_embeddings: config.processing.embedding_workers(),
        }
    }

    pub fn keyword(&self) -> &KeywordIndex {
        &self.keyword
    }

    pub fn vector(&self) -> &VectorIndex {
        &self.vector
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Index one chunk into both sub-indexes, replacing prior entries
    pub async fn index(&self, chunk: &Chunk) -> Result<()> {
        self.keyword.index(&chunk.id, &chunk.text);
        self.embed_and_upsert(chunk).await
    }

    /// Add keyword postings only
    pub fn index_keywords(&self, chunks: &[Chunk]) -> usize {
        for chunk in chunks {
            self.keyword.index(&chunk.id, &chunk.text);
        }
        chunks.len()
    }

    /// Index all chunks of a document
    ///
    /// Keyword postings are written first and survive embedding failures, so
    /// keyword-only search still reaches the document. The first embedding
    /// error is returned after every chunk has been attempted.
    pub async fn index_document(&self, chunks: &[Chunk]) -> Result<IndexReport> {
        let keyword_indexed = self.index_keywords(chunks);

        // built eagerly so the stream stays Send for spawned workers
        let pending: Vec<_> = chunks.iter().map(|c| self.embed_and_upsert(c)).collect();
        let results: Vec<Result<()>> = stream::iter(pending)
            .buffer_unordered(self.parallel_embeddings)
            .collect()
            .await;

        let mut vector_indexed = 0;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(()) => vector_indexed += 1,
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            None => Ok(IndexReport {
                keyword_indexed,
                vector_indexed,
            }),
            Some(e) => {
                tracing::warn!(
                    "Vector indexing incomplete: {}/{} chunks embedded: {}",
                    vector_indexed,
                    chunks.len(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Embed a query with retry on transient failures
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.retry
            .run("Query embedding", || self.embedder.embed(query))
            .await
    }

    async fn embed_and_upsert(&self, chunk: &Chunk) -> Result<()> {
        let vector = self.embed_chunk(chunk).await?;
        self.vector.upsert(&chunk.id, vector)
    }

    /// Embed a chunk, reusing the cached vector for identical text
    async fn embed_chunk(&self, chunk: &Chunk) -> Result<Vec<f32>> {
        if let Some(cached) = self.embedding_cache.get(&chunk.hash) {
            return Ok(cached.clone());
        }

        let vector = self
            .retry
            .run("Chunk embedding", || self.embedder.embed(&chunk.text))
            .await?;

        if vector.len() != self.vector.dimensions() {
            return Err(Error::embedding(format!(
                "Embedder '{}' returned {} dimensions, expected {}",
                self.embedder.name(),
                vector.len(),
                self.vector.dimensions()
            )));
        }

        self.embedding_cache.insert(chunk.hash.clone(), vector.clone());
        Ok(vector)
    }

    /// Remove a chunk from both sub-indexes
    pub fn remove(&self, chunk_id: &str) {
        self.keyword.remove(chunk_id);
        self.vector.remove(chunk_id);
    }

    pub fn cached_embeddings(&self) -> usize {
        self.embedding_cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedder;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    /// Fails the first `failures` calls with a transient error
    struct FlakyEmbedder {
        inner: HashEmbedder,
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(Error::index_unavailable("warming up"));
            }
            self.inner.embed(text).await
        }
        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }
        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
        fn name(&self) -> &str {
            "flaky"
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl EmbeddingProvider for BrokenEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(Error::embedding("model not loaded"))
        }
        fn dimensions(&self) -> usize {
            16
        }
        async fn health_check(&self) -> Result<bool> {
            Ok(false)
        }
        fn name(&self) -> &str {
            "broken"
        }
    }

    fn config() -> SpecScopeConfig {
        let mut config = SpecScopeConfig::default();
        config.processing.index_retry_base_ms = 1;
        config.processing.parallel_embeddings = Some(2);
        config
    }

    fn chunks() -> Vec<Chunk> {
        let doc = Uuid::new_v4();
        vec![
            Chunk::new(doc, "Door fire rating 90 minutes", 1, 0, 27, 0),
            Chunk::new(doc, "Roof insulation R-30", 1, 27, 47, 1),
        ]
    }

    #[tokio::test]
    async fn test_index_document_is_idempotent() {
        let indexer = Indexer::new(&config(), Arc::new(HashEmbedder::new(32)));
        let chunks = chunks();
        indexer.index_document(&chunks).await.unwrap();
        let report = indexer.index_document(&chunks).await.unwrap();

        assert_eq!(report.vector_indexed, 2);
        assert_eq!(indexer.keyword().len(), 2);
        assert_eq!(indexer.vector().len(), 2);
        assert_eq!(indexer.cached_embeddings(), 2);
    }

    #[tokio::test]
    async fn test_index_document_on_spawned_task() {
        let indexer = Arc::new(Indexer::new(&config(), Arc::new(HashEmbedder::new(32))));
        let task = {
            let indexer = indexer.clone();
            tokio::spawn(async move { indexer.index_document(&chunks()).await })
        };
        let report = task.await.unwrap().unwrap();

        assert_eq!(report.vector_indexed, 2);
        assert_eq!(indexer.vector().len(), 2);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let embedder = Arc::new(FlakyEmbedder {
            inner: HashEmbedder::new(16),
            failures: 2,
            calls: AtomicUsize::new(0),
        });
        let indexer = Indexer::new(&config(), embedder.clone());
        let chunk = &chunks()[0];
        indexer.index(chunk).await.unwrap();
        assert!(indexer.vector().contains(&chunk.id));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let embedder = Arc::new(FlakyEmbedder {
            inner: HashEmbedder::new(16),
            failures: 100,
            calls: AtomicUsize::new(0),
        });
        let indexer = Indexer::new(&config(), embedder.clone());
        let err = indexer.index(&chunks()[0]).await.unwrap_err();
        assert!(matches!(err, Error::IndexUnavailable(_)));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_embedding_failure_keeps_keyword_postings() {
        let indexer = Indexer::new(&config(), Arc::new(BrokenEmbedder));
        let chunks = chunks();
        let err = indexer.index_document(&chunks).await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
        assert_eq!(indexer.keyword().len(), 2);
        assert!(indexer.vector().is_empty());
        assert_eq!(indexer.keyword().search("insulation", 5, |_| true).len(), 1);
    }
}
