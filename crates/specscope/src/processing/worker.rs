//! Background worker for ingestion jobs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::timeout;

use crate::config::SpecScopeConfig;
use crate::error::{Error, Result};
use crate::index::Indexer;
use crate::ingestion::IngestPipeline;
use crate::store::ChunkStore;
use crate::types::DocumentStatus;

use super::job_queue::{Job, JobQueue, ProcessingStage};

/// Everything a single ingestion task needs
#[derive(Clone)]
struct IngestContext {
    store: Arc<ChunkStore>,
    indexer: Arc<Indexer>,
    pipeline: Arc<IngestPipeline>,
    job_queue: Arc<JobQueue>,
    snapshot_path: Option<PathBuf>,
    document_timeout: Duration,
}

/// Drains the job queue, ingesting documents concurrently
pub struct ProcessingWorker {
    ctx: IngestContext,
    parallel_documents: usize,
}

impl ProcessingWorker {
    pub fn new(
        config: &SpecScopeConfig,
        store: Arc<ChunkStore>,
        indexer: Arc<Indexer>,
        job_queue: Arc<JobQueue>,
    ) -> Self {
        let parallel_documents = config.processing.document_workers();
        tracing::info!(
            "Worker configured: {} parallel documents, {} embeddings/document, {}s timeout",
            parallel_documents,
            config.processing.embedding_workers(),
            config.processing.document_timeout_secs
        );

        Self {
            ctx: IngestContext {
                store,
                indexer,
                pipeline: Arc::new(IngestPipeline::new(config)),
                job_queue,
                snapshot_path: config
                    .storage
                    .persist
                    .then(|| config.storage.snapshot_path.clone()),
                document_timeout: Duration::from_secs(config.processing.document_timeout_secs),
            },
            parallel_documents,
        }
    }

    /// Process jobs until the queue's sender side is dropped
    pub async fn run(self, mut receiver: mpsc::Receiver<Job>) {
        tracing::info!("Processing worker started");
        let semaphore = Arc::new(Semaphore::new(self.parallel_documents.max(1)));

        while let Some(job) = receiver.recv().await {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let ctx = self.ctx.clone();
            tokio::spawn(async move {
                let _permit = permit;
                ctx.process(job).await;
            });
        }

        tracing::info!("Processing worker stopped");
    }
}

impl IngestContext {
    async fn process(&self, job: Job) {
        let job_id = job.id;
        let document_id = job.document_id;
        let filename = job.filename.clone();
        let started = std::time::Instant::now();

        self.job_queue.start(job_id);
        if let Err(e) = self
            .store
            .set_status(&document_id, DocumentStatus::Processing, None)
        {
            tracing::error!("[{}] Cannot start ingestion: {}", filename, e);
            self.job_queue.fail(job_id, e.to_string());
            return;
        }

        let outcome = match timeout(self.document_timeout, self.ingest(job)).await {
            Ok(result) => result,
            Err(_) => Err(Error::internal(format!(
                "Ingestion timed out after {}s",
                self.document_timeout.as_secs()
            ))),
        };

        match outcome {
            Ok(chunks) => {
                if let Err(e) = self
                    .store
                    .set_status(&document_id, DocumentStatus::Completed, None)
                {
                    tracing::error!("[{}] Failed to mark completed: {}", filename, e);
                }
                self.job_queue.complete(job_id);
                tracing::info!(
                    "[{}] Ingested {} chunks in {:.1}s",
                    filename,
                    chunks,
                    started.elapsed().as_secs_f64()
                );
            }
            Err(e) => {
                tracing::error!("[{}] Ingestion failed: {}", filename, e);
                if let Err(status_err) = self.store.set_status(
                    &document_id,
                    DocumentStatus::Failed,
                    Some(e.to_string()),
                ) {
                    tracing::error!("[{}] Failed to mark failed: {}", filename, status_err);
                }
                self.job_queue.fail(job_id, e.to_string());
            }
        }

        self.persist().await;
    }

    /// Parse, chunk, store and index one document; returns the chunk count
    async fn ingest(&self, job: Job) -> Result<usize> {
        let Job {
            id: job_id,
            document_id,
            filename,
            data,
        } = job;

        let pipeline = self.pipeline.clone();
        let name = filename.clone();
        let output = tokio::task::spawn_blocking(move || pipeline.run(document_id, &name, &data))
            .await
            .map_err(|e| Error::internal(format!("Ingestion task failed: {}", e)))??;

        if output.chunks.is_empty() {
            return Err(Error::file_parse(&filename, "No chunks produced"));
        }

        self.store.update_document(&document_id, |doc| {
            doc.total_pages = output.parsed.total_pages;
            doc.class = output.class;
            doc.section = output.section.clone();
            doc.division = output.division.clone();
        })?;

        let chunks = output.chunks;
        let count = chunks.len();
        self.job_queue.set_total_chunks(job_id, count);
        self.store.add_chunks(&document_id, chunks.clone())?;
        self.store
            .update_document(&document_id, |doc| doc.total_chunks = count as u32)?;

        self.job_queue.update_stage(job_id, ProcessingStage::Indexing);
        let report = self.indexer.index_document(&chunks).await?;
        self.job_queue.set_chunks_indexed(job_id, report.vector_indexed);
        self.store
            .update_document(&document_id, |doc| doc.vector_indexed = true)?;

        Ok(count)
    }

    async fn persist(&self) {
        let Some(path) = self.snapshot_path.clone() else {
            return;
        };
        let store = self.store.clone();
        match tokio::task::spawn_blocking(move || store.save(&path)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Failed to save snapshot: {}", e),
            Err(e) => tracing::warn!("Snapshot task failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedder;
    use crate::types::Document;

    fn setup() -> (SpecScopeConfig, Arc<ChunkStore>, Arc<Indexer>) {
        let config = SpecScopeConfig::default();
        let store = Arc::new(ChunkStore::new());
        let embedder = Arc::new(HashEmbedder::new(config.embeddings.dimensions));
        let indexer = Arc::new(Indexer::new(&config, embedder));
        (config, store, indexer)
    }

    async fn wait_terminal(store: &ChunkStore, id: &uuid::Uuid) -> DocumentStatus {
        for _ in 0..200 {
            let status = store.get_document(id).unwrap().status;
            if status.is_terminal() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("document never reached a terminal status");
    }

    #[tokio::test]
    async fn test_worker_ingests_document() {
        let (config, store, indexer) = setup();
        let (queue, rx) = JobQueue::new(8);
        let queue = Arc::new(queue);
        let worker = ProcessingWorker::new(&config, store.clone(), indexer.clone(), queue.clone());
        tokio::spawn(worker.run(rx));

        let text = "SECTION 08 11 13 HOLLOW METAL DOORS\nFire rating: 90 minutes.";
        let doc = Document::new("doors.txt", crate::types::sha256_hex(text.as_bytes()), text.len() as u64);
        let doc_id = store.put(doc);
        let job_id = queue
            .submit(Job::new(doc_id, "doors.txt", text.as_bytes().to_vec()))
            .await
            .unwrap();

        assert_eq!(wait_terminal(&store, &doc_id).await, DocumentStatus::Completed);
        let doc = store.get_document(&doc_id).unwrap();
        assert_eq!(doc.total_chunks, 1);
        assert!(doc.vector_indexed);
        assert_eq!(indexer.keyword().len(), 1);
        assert_eq!(indexer.vector().len(), 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(queue.get(&job_id).unwrap().status.is_finished());
    }

    #[tokio::test]
    async fn test_unparseable_document_fails() {
        let (config, store, indexer) = setup();
        let (queue, rx) = JobQueue::new(8);
        let queue = Arc::new(queue);
        tokio::spawn(ProcessingWorker::new(&config, store.clone(), indexer, queue.clone()).run(rx));

        let doc_id = store.put(Document::new("blank.txt", "h".to_string(), 3));
        queue
            .submit(Job::new(doc_id, "blank.txt", b"   ".to_vec()))
            .await
            .unwrap();

        assert_eq!(wait_terminal(&store, &doc_id).await, DocumentStatus::Failed);
        let doc = store.get_document(&doc_id).unwrap();
        assert!(doc.error_message.is_some());
        assert!(!doc.is_searchable());
    }
}
