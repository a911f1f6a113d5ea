//! Job queue for background document ingestion with progress tracking

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Processing stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    Queued,
    /// Parsing and chunking
    Parsing,
    /// Keyword postings and embeddings
    Indexing,
    Complete,
    Failed,
}

/// Job status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Progress of one document's ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: Uuid,
    pub document_id: Uuid,
    pub filename: String,
    pub status: JobStatus,
    pub stage: ProcessingStage,
    pub total_chunks: usize,
    pub chunks_indexed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl JobProgress {
    pub fn new(job_id: Uuid, document_id: Uuid, filename: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            job_id,
            document_id,
            filename: filename.into(),
            status: JobStatus::Pending,
            stage: ProcessingStage::Queued,
            total_chunks: 0,
            chunks_indexed: 0,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn percent_complete(&self) -> f32 {
        match self.stage {
            ProcessingStage::Queued => 0.0,
            ProcessingStage::Parsing => 10.0,
            ProcessingStage::Indexing if self.total_chunks > 0 => {
                10.0 + 90.0 * self.chunks_indexed as f32 / self.total_chunks as f32
            }
            ProcessingStage::Indexing => 10.0,
            ProcessingStage::Complete | ProcessingStage::Failed => 100.0,
        }
    }
}

/// An ingestion job: one uploaded document
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub document_id: Uuid,
    pub filename: String,
    pub data: Vec<u8>,
}

impl Job {
    pub fn new(document_id: Uuid, filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            filename: filename.into(),
            data,
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub queued: usize,
    pub pending: usize,
    pub processing: usize,
    pub complete: usize,
    pub failed: usize,
}

/// Job queue feeding the ingestion worker
pub struct JobQueue {
    jobs: Arc<DashMap<Uuid, JobProgress>>,
    sender: mpsc::Sender<Job>,
    queue_size: Arc<AtomicUsize>,
}

impl JobQueue {
    /// Create a queue and the receiver its worker drains
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Job>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let queue = Self {
            jobs: Arc::new(DashMap::new()),
            sender,
            queue_size: Arc::new(AtomicUsize::new(0)),
        };
        (queue, receiver)
    }

    /// Submit a job; progress is visible immediately
    pub async fn submit(&self, job: Job) -> Result<Uuid> {
        let job_id = job.id;
        self.jobs.insert(
            job_id,
            JobProgress::new(job_id, job.document_id, job.filename.clone()),
        );
        self.queue_size.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = self.sender.send(job).await {
            tracing::error!("Failed to submit job {}: {}", job_id, e);
            self.queue_size.fetch_sub(1, Ordering::SeqCst);
            self.fail(job_id, "Ingestion worker is not running");
            return Err(Error::internal(format!("Failed to submit job: {}", e)));
        }
        Ok(job_id)
    }

    pub fn get(&self, job_id: &Uuid) -> Option<JobProgress> {
        self.jobs.get(job_id).map(|p| p.clone())
    }

    /// Most recent job for a document
    pub fn for_document(&self, document_id: &Uuid) -> Option<JobProgress> {
        self.jobs
            .iter()
            .filter(|p| p.document_id == *document_id)
            .max_by_key(|p| p.created_at)
            .map(|p| p.clone())
    }

    /// Called by the worker when it picks a job up
    pub fn start(&self, job_id: Uuid) {
        self.queue_size.fetch_sub(1, Ordering::SeqCst);
        self.update(job_id, |p| {
            p.status = JobStatus::Processing;
            p.stage = ProcessingStage::Parsing;
        });
    }

    pub fn update_stage(&self, job_id: Uuid, stage: ProcessingStage) {
        self.update(job_id, |p| p.stage = stage);
    }

    pub fn set_total_chunks(&self, job_id: Uuid, total: usize) {
        self.update(job_id, |p| p.total_chunks = total);
    }

    pub fn set_chunks_indexed(&self, job_id: Uuid, indexed: usize) {
        self.update(job_id, |p| p.chunks_indexed = indexed);
    }

    pub fn complete(&self, job_id: Uuid) {
        self.update(job_id, |p| {
            p.status = JobStatus::Complete;
            p.stage = ProcessingStage::Complete;
        });
    }

    pub fn fail(&self, job_id: Uuid, error: impl Into<String>) {
        let error = error.into();
        self.update(job_id, |p| {
            p.status = JobStatus::Failed;
            p.stage = ProcessingStage::Failed;
            p.error = Some(error);
        });
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            queued: self.queue_size.load(Ordering::SeqCst),
            ..Default::default()
        };
        for p in self.jobs.iter() {
            match p.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Complete => stats.complete += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    fn update(&self, job_id: Uuid, f: impl FnOnce(&mut JobProgress)) {
        if let Some(mut progress) = self.jobs.get_mut(&job_id) {
            f(&mut progress);
            progress.updated_at = chrono::Utc::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_and_track() {
        let (queue, mut rx) = JobQueue::new(4);
        let doc = Uuid::new_v4();
        let job_id = queue.submit(Job::new(doc, "a.txt", b"x".to_vec())).await.unwrap();

        let progress = queue.get(&job_id).unwrap();
        assert_eq!(progress.status, JobStatus::Pending);
        assert_eq!(progress.document_id, doc);
        assert_eq!(queue.stats().queued, 1);

        let job = rx.recv().await.unwrap();
        assert_eq!(job.id, job_id);
        queue.start(job_id);
        queue.set_total_chunks(job_id, 4);
        queue.update_stage(job_id, ProcessingStage::Indexing);
        queue.set_chunks_indexed(job_id, 2);
        assert!((queue.get(&job_id).unwrap().percent_complete() - 55.0).abs() < 1e-4);

        queue.complete(job_id);
        let progress = queue.for_document(&doc).unwrap();
        assert!(progress.status.is_finished());
        assert_eq!(queue.stats().complete, 1);
        assert_eq!(queue.stats().queued, 0);
    }

    #[tokio::test]
    async fn test_submit_without_worker_fails_job() {
        let (queue, rx) = JobQueue::new(1);
        drop(rx);
        let job = Job::new(Uuid::new_v4(), "a.txt", Vec::new());
        let job_id = job.id;
        assert!(queue.submit(job).await.is_err());
        let progress = queue.get(&job_id).unwrap();
        assert_eq!(progress.status, JobStatus::Failed);
        assert!(progress.error.is_some());
    }
}
