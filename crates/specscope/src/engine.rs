//! Engine facade: upload, search, QA, conflicts and job tracking

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cache::{AnswerCache, CacheStats};
use crate::config::SpecScopeConfig;
use crate::conflict::ConflictDetector;
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::generation::QaSynthesizer;
use crate::index::Indexer;
use crate::ingestion::FileType;
use crate::processing::{Job, JobProgress, JobQueue, ProcessingWorker, QueueStats};
use crate::retrieval::HybridRetriever;
use crate::scoring::ConfidenceScorer;
use crate::store::ChunkStore;
use crate::types::{
    sha256_hex, Chunk, ConflictRequest, ConflictResponse, Document, DocumentStatus, DocumentSummary,
    QaRequest, QaResponse, SearchRequest, SearchResponse, UploadResponse, UploadStatus,
};

/// Pending jobs the queue holds before `upload` waits on the worker
const JOB_QUEUE_CAPACITY: usize = 1000;

/// A file handed to `upload`
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub data: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

/// Corpus statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineStats {
    pub documents: usize,
    pub chunks: usize,
    pub keyword_indexed: usize,
    pub vector_indexed: usize,
    pub generation: u64,
    pub jobs: QueueStats,
    pub cache: CacheStats,
}

/// Shared engine handle
#[derive(Clone)]
pub struct SpecScopeEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: SpecScopeConfig,
    store: Arc<ChunkStore>,
    indexer: Arc<Indexer>,
    retriever: Arc<HybridRetriever>,
    synthesizer: QaSynthesizer,
    detector: ConflictDetector,
    cache: AnswerCache,
    job_queue: Arc<JobQueue>,
}

impl SpecScopeEngine {
    /// Build an engine with the configured embedding backend
    ///
    /// Must be called inside a tokio runtime; the ingestion worker is spawned.
    pub async fn new(config: SpecScopeConfig) -> Result<Self> {
        let embedder = create_provider(&config.embeddings)?;
        Self::with_embedder(config, embedder).await
    }

    /// Build an engine around a specific embedding provider
    pub async fn with_embedder(
        config: SpecScopeConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        config.validate()?;
        if embedder.dimensions() != config.embeddings.dimensions {
            return Err(Error::Config(format!(
                "Embedder '{}' produces {} dimensions, config expects {}",
                embedder.name(),
                embedder.dimensions(),
                config.embeddings.dimensions
            )));
        }

        let store = if config.storage.persist {
            Arc::new(ChunkStore::load(&config.storage.snapshot_path)?)
        } else {
            Arc::new(ChunkStore::new())
        };
        let indexer = Arc::new(Indexer::new(&config, embedder));
        rebuild_indexes(&store, &indexer).await;

        let scorer = ConfidenceScorer::new(config.confidence.clone());
        let retriever = Arc::new(HybridRetriever::new(
            store.clone(),
            indexer.clone(),
            config.retrieval.clone(),
            scorer.clone(),
        ));
        let synthesizer =
            QaSynthesizer::new(retriever.clone(), store.clone(), config.qa.clone(), scorer);

        let (job_queue, receiver) = JobQueue::new(JOB_QUEUE_CAPACITY);
        let job_queue = Arc::new(job_queue);
        let worker = ProcessingWorker::new(&config, store.clone(), indexer.clone(), job_queue.clone());
        tokio::spawn(worker.run(receiver));

        tracing::info!(
            "Engine ready: {} documents, {} chunks",
            store.document_count(),
            store.chunk_count()
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                detector: ConflictDetector::new(config.conflicts.clone()),
                cache: AnswerCache::new(&config.cache),
                config,
                store,
                indexer,
                retriever,
                synthesizer,
                job_queue,
            }),
        })
    }

    pub fn config(&self) -> &SpecScopeConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.inner.store
    }

    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.inner.indexer
    }

    /// Register files and queue their ingestion
    ///
    /// Returns immediately; each accepted document progresses through
    /// `Uploading -> Processing -> Completed | Failed` in the background.
    /// Files whose content is already present are reported as duplicates.
    pub async fn upload(&self, files: Vec<UploadFile>) -> Result<UploadResponse> {
        if files.is_empty() {
            return Err(Error::validation("No files provided"));
        }

        let mut statuses = Vec::with_capacity(files.len());
        for file in files {
            statuses.push(self.upload_one(file).await);
        }

        let response = UploadResponse::new(statuses);
        tracing::info!(
            "Upload: {} accepted, {} rejected, {} duplicate",
            response.accepted,
            response.rejected,
            response.files.len() - response.accepted - response.rejected
        );
        Ok(response)
    }

    async fn upload_one(&self, file: UploadFile) -> UploadStatus {
        let UploadFile { filename, data } = file;
        if let Some(error) = self.check_upload(&filename, &data) {
            return UploadStatus::Rejected { filename, error };
        }

        let content_hash = sha256_hex(&data);
        if let Some(existing) = self.inner.store.find_by_hash(&content_hash) {
            tracing::info!("[{}] Duplicate of {}", filename, existing.filename);
            return UploadStatus::Duplicate {
                existing_document_id: existing.id,
                existing_filename: existing.filename,
                filename,
            };
        }

        let document = Document::new(filename.clone(), content_hash, data.len() as u64);
        let summary = DocumentSummary::from(&document);
        let document_id = self.inner.store.put(document);

        match self
            .inner
            .job_queue
            .submit(Job::new(document_id, filename.clone(), data))
            .await
        {
            Ok(job_id) => UploadStatus::Accepted {
                document: summary,
                job_id,
            },
            Err(e) => {
                if let Err(status_err) =
                    self.inner
                        .store
                        .set_status(&document_id, DocumentStatus::Failed, Some(e.to_string()))
                {
                    tracing::error!("[{}] Failed to mark failed: {}", filename, status_err);
                }
                UploadStatus::Rejected {
                    filename,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Reason to reject a file before ingestion, if any
    fn check_upload(&self, filename: &str, data: &[u8]) -> Option<String> {
        if filename.trim().is_empty() {
            return Some("Missing filename".to_string());
        }
        if FileType::from_filename(filename).is_none() {
            let ext = filename.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
            return Some(Error::UnsupportedFileType(ext.to_string()).to_string());
        }
        if data.is_empty() {
            return Some("Empty file".to_string());
        }
        let max = self.inner.config.processing.max_file_size;
        if data.len() as u64 > max {
            return Some(format!("File is {} bytes, limit is {} bytes", data.len(), max));
        }
        None
    }

    /// Hybrid keyword + vector search
    ///
    /// A blank query returns no results without validating the other
    /// parameters.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let start = Instant::now();
        if request.query.trim().is_empty() {
            return Ok(SearchResponse {
                query: request.query.clone(),
                results: Vec::new(),
                total_results: 0,
                degraded: false,
                processing_time_ms: start.elapsed().as_millis() as u64,
            });
        }
        request.validate()?;
        let retrieval = self
            .inner
            .retriever
            .search(
                &request.query,
                request.top_k,
                request.alpha,
                request.document_filter.as_deref(),
            )
            .await?;

        Ok(SearchResponse {
            query: request.query.clone(),
            total_results: retrieval.results.len(),
            results: retrieval.results,
            degraded: retrieval.degraded,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Answer a question with citations, cut short after the QA timeout
    pub async fn qa(&self, request: &QaRequest) -> Result<QaResponse> {
        self.qa_with_cancel(request, &CancellationToken::new()).await
    }

    /// Answer a question; `cancel` stops composition and returns a partial answer
    pub async fn qa_with_cancel(
        &self,
        request: &QaRequest,
        cancel: &CancellationToken,
    ) -> Result<QaResponse> {
        request.validate()?;
        let start = Instant::now();
        let filter = request.document_filter.as_deref();
        let key = AnswerCache::key(&request.question, request.top_k, filter);
        let generation = self.inner.store.generation();

        if let Some(mut cached) = self.inner.cache.get(&key, generation) {
            cached.processing_time_ms = start.elapsed().as_millis() as u64;
            return Ok(cached);
        }

        let timeout = Duration::from_secs(self.inner.config.qa.timeout_secs);
        let mut response = self
            .inner
            .synthesizer
            .answer(&request.question, request.top_k, filter, cancel, timeout)
            .await?;
        response.processing_time_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            "QA '{}': {} citations, confidence {:.2}{}{}",
            request.question,
            response.citations.len(),
            response.confidence,
            if response.abstained { ", abstained" } else { "" },
            if response.partial { ", partial" } else { "" }
        );

        // generation may have moved while answering
        if self.inner.store.generation() == generation {
            self.inner.cache.put(key, &response, generation);
        }
        Ok(response)
    }

    /// All documents, oldest upload first
    pub fn documents(&self) -> Vec<Document> {
        self.inner.store.list_documents()
    }

    pub fn document(&self, id: &Uuid) -> Result<Document> {
        self.inner.store.get_document(id)
    }

    /// Chunks of a document in reading order
    pub fn chunks(&self, id: &Uuid) -> Result<Vec<Chunk>> {
        self.inner.store.get_chunks_by_document(id)
    }

    /// Conflicts among the chunks retrieved for a query, or across the corpus
    pub async fn conflicts(&self, request: &ConflictRequest) -> Result<ConflictResponse> {
        self.conflicts_with_cancel(request, &CancellationToken::new()).await
    }

    /// Like `conflicts`; `cancel` stops a corpus scan early with a partial result
    pub async fn conflicts_with_cancel(
        &self,
        request: &ConflictRequest,
        cancel: &CancellationToken,
    ) -> Result<ConflictResponse> {
        request.validate()?;
        let Some(query) = request.query.as_deref() else {
            return self
                .scan_filtered(request.document_filter.as_deref(), cancel)
                .await;
        };

        let start = Instant::now();
        let retrieval = self
            .inner
            .retriever
            .search(
                query,
                request.top_k,
                self.inner.config.retrieval.default_alpha,
                request.document_filter.as_deref(),
            )
            .await?;
        let chunks: Vec<Chunk> = retrieval
            .results
            .iter()
            .filter_map(|r| self.inner.store.get_chunk(&r.chunk_id).ok())
            .collect();

        let conflicts = self
            .inner
            .detector
            .detect_conflicts(&chunks, &self.filenames());
        tracing::info!(
            "Conflicts for '{}': {} across {} chunks",
            query,
            conflicts.len(),
            chunks.len()
        );

        Ok(ConflictResponse {
            conflicts,
            chunks_examined: chunks.len(),
            partial: false,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Full-corpus conflict scan; partial when cancelled or timed out
    pub async fn scan_conflicts(&self, cancel: &CancellationToken) -> Result<ConflictResponse> {
        self.scan_filtered(None, cancel).await
    }

    async fn scan_filtered(
        &self,
        document_filter: Option<&[Uuid]>,
        cancel: &CancellationToken,
    ) -> Result<ConflictResponse> {
        let start = Instant::now();
        let mut chunks = self.inner.store.searchable_chunks();
        if let Some(ids) = document_filter {
            chunks.retain(|c| ids.contains(&c.document_id));
        }

        let timeout = Duration::from_secs(self.inner.config.conflicts.scan_timeout_secs);
        let outcome = self
            .inner
            .detector
            .scan(&chunks, &self.filenames(), cancel, timeout)
            .await;
        tracing::info!(
            "Conflict scan: {} conflicts across {} chunks{}",
            outcome.conflicts.len(),
            outcome.chunks_examined,
            if outcome.partial { " (partial)" } else { "" }
        );

        Ok(ConflictResponse {
            conflicts: outcome.conflicts,
            chunks_examined: outcome.chunks_examined,
            partial: outcome.partial,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Progress of an ingestion job
    pub fn job(&self, id: &Uuid) -> Result<JobProgress> {
        self.inner.job_queue.get(id).ok_or_else(|| Error::NotFound {
            kind: "Job",
            id: id.to_string(),
        })
    }

    /// Latest ingestion job of a document
    pub fn job_for_document(&self, document_id: &Uuid) -> Option<JobProgress> {
        self.inner.job_queue.for_document(document_id)
    }

    /// Whether the embedding backend answers
    pub async fn health_check(&self) -> Result<bool> {
        self.inner.indexer.embedder().health_check().await
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            documents: self.inner.store.document_count(),
            chunks: self.inner.store.chunk_count(),
            keyword_indexed: self.inner.indexer.keyword().len(),
            vector_indexed: self.inner.indexer.vector().len(),
            generation: self.inner.store.generation(),
            jobs: self.inner.job_queue.stats(),
            cache: self.inner.cache.stats(),
        }
    }

    fn filenames(&self) -> HashMap<Uuid, String> {
        self.inner
            .store
            .list_documents()
            .into_iter()
            .map(|d| (d.id, d.filename))
            .collect()
    }
}

/// Re-index every searchable document after a snapshot restore
async fn rebuild_indexes(store: &ChunkStore, indexer: &Indexer) {
    for doc in store.list_documents() {
        if !doc.is_searchable() {
            continue;
        }
        let Ok(chunks) = store.get_chunks_by_document(&doc.id) else {
            continue;
        };
        let vector_ok = match indexer.index_document(&chunks).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("[{}] Vector index not rebuilt: {}", doc.filename, e);
                false
            }
        };
        let _ = store.update_document(&doc.id, |d| d.vector_indexed = vector_ok);
    }
}
