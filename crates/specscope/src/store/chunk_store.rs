//! Chunk store with a secondary index by document

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{Chunk, Document, DocumentStatus};

/// Serialized form of the store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub documents: Vec<Document>,
    pub chunks: Vec<Chunk>,
}

/// Persists documents and chunks with page/section metadata
#[derive(Default)]
pub struct ChunkStore {
    documents: DashMap<Uuid, Document>,
    chunks: DashMap<String, Chunk>,
    /// Chunk IDs per document, in chunk_index order
    by_document: DashMap<Uuid, Vec<String>>,
    /// Bumped whenever a document reaches a terminal state
    generation: AtomicU64,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document, returning its ID
    pub fn put(&self, document: Document) -> Uuid {
        let id = document.id;
        self.documents.insert(id, document);
        self.by_document.entry(id).or_default();
        id
    }

    /// Add chunks to a known document
    ///
    /// Chunk IDs are content-derived, so re-adding an existing ID must carry
    /// identical text.
    pub fn add_chunks(&self, document_id: &Uuid, chunks: Vec<Chunk>) -> Result<usize> {
        if !self.documents.contains_key(document_id) {
            return Err(Error::document_not_found(document_id));
        }

        for chunk in &chunks {
            if chunk.document_id != *document_id {
                return Err(Error::validation(format!(
                    "Chunk {} belongs to document {}, not {}",
                    chunk.id, chunk.document_id, document_id
                )));
            }
            if chunk.char_start >= chunk.char_end {
                return Err(Error::validation(format!(
                    "Chunk {} has empty span {}..{}",
                    chunk.id, chunk.char_start, chunk.char_end
                )));
            }
            if chunk.text.len() != chunk.char_end - chunk.char_start {
                return Err(Error::validation(format!(
                    "Chunk {} text length does not match its span",
                    chunk.id
                )));
            }
            if let Some(existing) = self.chunks.get(&chunk.id) {
                if existing.text != chunk.text {
                    return Err(Error::validation(format!(
                        "Chunk {} already stored with different text",
                        chunk.id
                    )));
                }
            }
        }

        let added = chunks.len();
        let mut ids = self.by_document.entry(*document_id).or_default();
        for chunk in chunks {
            if !ids.contains(&chunk.id) {
                ids.push(chunk.id.clone());
            }
            self.chunks.insert(chunk.id.clone(), chunk);
        }
        ids.sort_by_key(|id| self.chunks.get(id).map(|c| c.chunk_index).unwrap_or(u32::MAX));
        drop(ids);

        if let Some(mut doc) = self.documents.get_mut(document_id) {
            doc.total_chunks = self
                .by_document
                .get(document_id)
                .map(|ids| ids.len() as u32)
                .unwrap_or(0);
        }

        Ok(added)
    }

    pub fn get_document(&self, id: &Uuid) -> Result<Document> {
        self.documents
            .get(id)
            .map(|d| d.clone())
            .ok_or_else(|| Error::document_not_found(id))
    }

    /// All documents, oldest upload first
    pub fn list_documents(&self) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .documents
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        docs.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at).then(a.id.cmp(&b.id)));
        docs
    }

    /// Chunks of a document in `chunk_index` order
    pub fn get_chunks_by_document(&self, id: &Uuid) -> Result<Vec<Chunk>> {
        if !self.documents.contains_key(id) {
            return Err(Error::document_not_found(id));
        }
        Ok(self
            .by_document
            .get(id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|cid| self.chunks.get(cid).map(|c| c.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn get_chunk(&self, id: &str) -> Result<Chunk> {
        self.chunks
            .get(id)
            .map(|c| c.clone())
            .ok_or_else(|| Error::chunk_not_found(id))
    }

    /// Move a document to a new status, recording an error message on failure
    pub fn set_status(
        &self,
        id: &Uuid,
        status: DocumentStatus,
        error_message: Option<String>,
    ) -> Result<()> {
        let mut doc = self
            .documents
            .get_mut(id)
            .ok_or_else(|| Error::document_not_found(id))?;

        if doc.status == status && !status.is_terminal() {
            return Ok(());
        }
        if !doc.status.can_transition_to(status) {
            return Err(Error::validation(format!(
                "Invalid status transition for {}: {:?} -> {:?}",
                id, doc.status, status
            )));
        }

        doc.status = status;
        if error_message.is_some() {
            doc.error_message = error_message;
        }
        if status.is_terminal() {
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Apply an in-place update to a document
    pub fn update_document<F>(&self, id: &Uuid, f: F) -> Result<()>
    where
        F: FnOnce(&mut Document),
    {
        let mut doc = self
            .documents
            .get_mut(id)
            .ok_or_else(|| Error::document_not_found(id))?;
        f(doc.value_mut());
        Ok(())
    }

    /// Find a document by content hash, ignoring failed ingestions
    pub fn find_by_hash(&self, content_hash: &str) -> Option<Document> {
        self.documents
            .iter()
            .find(|entry| {
                let doc = entry.value();
                doc.content_hash == content_hash && doc.status != DocumentStatus::Failed
            })
            .map(|entry| entry.value().clone())
    }

    /// Parent document of a chunk
    pub fn document_of(&self, chunk_id: &str) -> Option<Uuid> {
        self.chunks.get(chunk_id).map(|c| c.document_id)
    }

    /// Whether chunks of this document may be returned by search
    ///
    /// A failed document is hidden once a completed document with the same
    /// content has been ingested.
    pub fn is_searchable(&self, document_id: &Uuid) -> bool {
        let Some(doc) = self.documents.get(document_id).map(|d| d.clone()) else {
            return false;
        };
        self.searchable(&doc)
    }

    fn searchable(&self, doc: &Document) -> bool {
        doc.is_searchable()
            && !(doc.status == DocumentStatus::Failed && self.has_completed(&doc.content_hash))
    }

    fn has_completed(&self, content_hash: &str) -> bool {
        self.documents.iter().any(|entry| {
            let doc = entry.value();
            doc.content_hash == content_hash && doc.status == DocumentStatus::Completed
        })
    }

    /// Filename of a document, if known
    pub fn filename(&self, document_id: &Uuid) -> Option<String> {
        self.documents.get(document_id).map(|d| d.filename.clone())
    }

    /// Corpus generation, used to invalidate cached answers
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Every chunk of every searchable document, in document then chunk order
    pub fn searchable_chunks(&self) -> Vec<Chunk> {
        let mut out = Vec::new();
        for doc in self.list_documents() {
            if !self.searchable(&doc) {
                continue;
            }
            if let Ok(chunks) = self.get_chunks_by_document(&doc.id) {
                out.extend(chunks);
            }
        }
        out
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Capture the whole store
    pub fn snapshot(&self) -> Snapshot {
        let documents = self.list_documents();
        let mut chunks = Vec::with_capacity(self.chunks.len());
        for doc in &documents {
            if let Some(ids) = self.by_document.get(&doc.id) {
                chunks.extend(ids.iter().filter_map(|id| self.chunks.get(id).map(|c| c.clone())));
            }
        }
        Snapshot { documents, chunks }
    }

    /// Rebuild a store from a snapshot
    ///
    /// Documents interrupted mid-ingestion come back as `Failed`.
    pub fn restore(snapshot: Snapshot) -> Result<Self> {
        let store = Self::new();
        for mut doc in snapshot.documents {
            if !doc.status.is_terminal() {
                doc.status = DocumentStatus::Failed;
                doc.error_message = Some("Ingestion interrupted by restart".to_string());
            }
            store.put(doc);
        }

        let mut grouped: std::collections::HashMap<Uuid, Vec<Chunk>> = Default::default();
        for chunk in snapshot.chunks {
            grouped.entry(chunk.document_id).or_default().push(chunk);
        }
        for (doc_id, chunks) in grouped {
            store.add_chunks(&doc_id, chunks)?;
        }
        Ok(store)
    }

    /// Write the snapshot as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(&self.snapshot())?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        tracing::debug!("Saved snapshot to {}", path.display());
        Ok(())
    }

    /// Load a store from a JSON snapshot; a missing file yields an empty store
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        tracing::info!(
            "Loaded {} documents and {} chunks from {}",
            snapshot.documents.len(),
            snapshot.chunks.len(),
            path.display()
        );
        Self::restore(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_chunks(store: &ChunkStore, texts: &[&str]) -> Uuid {
        let doc = Document::new("spec.txt", "hash", 100);
        let id = store.put(doc);
        let mut offset = 0;
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let c = Chunk::new(id, *t, 1, offset, offset + t.len(), i as u32);
                offset += t.len();
                c
            })
            .collect();
        store.add_chunks(&id, chunks).unwrap();
        id
    }

    #[test]
    fn test_put_and_get() {
        let store = ChunkStore::new();
        let id = doc_with_chunks(&store, &["alpha text", "beta text"]);
        let doc = store.get_document(&id).unwrap();
        assert_eq!(doc.total_chunks, 2);
        let chunks = store.get_chunks_by_document(&id).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "alpha text");
        assert!(store.get_chunk(&chunks[1].id).is_ok());
    }

    #[test]
    fn test_unknown_ids() {
        let store = ChunkStore::new();
        assert!(matches!(
            store.get_document(&Uuid::new_v4()),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(store.get_chunk("nope"), Err(Error::NotFound { .. })));
        let orphan = Chunk::new(Uuid::new_v4(), "x", 1, 0, 1, 0);
        assert!(store.add_chunks(&orphan.document_id.clone(), vec![orphan]).is_err());
    }

    #[test]
    fn test_readding_chunk_does_not_duplicate() {
        let store = ChunkStore::new();
        let id = doc_with_chunks(&store, &["same text"]);
        let chunk = store.get_chunks_by_document(&id).unwrap().remove(0);
        store.add_chunks(&id, vec![chunk]).unwrap();
        assert_eq!(store.get_chunks_by_document(&id).unwrap().len(), 1);
        assert_eq!(store.chunk_count(), 1);
    }

    #[test]
    fn test_terminal_status_is_final() {
        let store = ChunkStore::new();
        let id = store.put(Document::new("a.txt", "h", 1));
        store.set_status(&id, DocumentStatus::Processing, None).unwrap();
        store.set_status(&id, DocumentStatus::Completed, None).unwrap();
        assert_eq!(store.generation(), 1);
        assert!(store
            .set_status(&id, DocumentStatus::Failed, Some("late".into()))
            .is_err());
    }

    #[test]
    fn test_failed_copy_hidden_by_completed_reupload() {
        let store = ChunkStore::new();
        let failed = doc_with_chunks(&store, &["Fire rating: 2 hours."]);
        store.set_status(&failed, DocumentStatus::Processing, None).unwrap();
        store
            .set_status(&failed, DocumentStatus::Failed, Some("embedder down".into()))
            .unwrap();
        assert!(store.is_searchable(&failed));
        assert_eq!(store.searchable_chunks().len(), 1);

        let retried = doc_with_chunks(&store, &["Fire rating: 2 hours."]);
        store.set_status(&retried, DocumentStatus::Processing, None).unwrap();
        store.set_status(&retried, DocumentStatus::Completed, None).unwrap();

        assert!(!store.is_searchable(&failed));
        assert!(store.is_searchable(&retried));
        let chunks = store.searchable_chunks();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].document_id, retried);
    }

    #[test]
    fn test_snapshot_roundtrip_via_file() {
        let store = ChunkStore::new();
        let id = doc_with_chunks(&store, &["one", "two"]);
        store.set_status(&id, DocumentStatus::Processing, None).unwrap();
        store.set_status(&id, DocumentStatus::Completed, None).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        store.save(&path).unwrap();

        let restored = ChunkStore::load(&path).unwrap();
        assert_eq!(restored.document_count(), 1);
        assert_eq!(restored.chunk_count(), 2);
        assert_eq!(
            restored.get_document(&id).unwrap().status,
            DocumentStatus::Completed
        );
    }

    #[test]
    fn test_restore_marks_interrupted_as_failed() {
        let store = ChunkStore::new();
        let id = store.put(Document::new("a.txt", "h", 1));
        let restored = ChunkStore::restore(store.snapshot()).unwrap();
        let doc = restored.get_document(&id).unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert!(doc.error_message.is_some());
    }
}
