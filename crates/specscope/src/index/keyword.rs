//! In-memory BM25 inverted index

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::tokenizer::tokenize;

/// Per-chunk bookkeeping needed to score and to remove postings
#[derive(Debug, Clone)]
struct DocEntry {
    length: u32,
    terms: Vec<String>,
}

/// BM25 inverted index keyed by chunk ID
///
/// Readers never lock; writers serialize on a mutex so document length
/// statistics stay consistent with the postings.
pub struct KeywordIndex {
    /// token -> chunk_id -> term frequency
    postings: DashMap<String, HashMap<String, u32>>,
    docs: DashMap<String, DocEntry>,
    total_length: AtomicU64,
    write_lock: Mutex<()>,
    k1: f32,
    b: f32,
}

impl KeywordIndex {
    pub fn new(k1: f32, b: f32) -> Self {
        Self {
            postings: DashMap::new(),
            docs: DashMap::new(),
            total_length: AtomicU64::new(0),
            write_lock: Mutex::new(()),
            k1,
            b,
        }
    }

    /// Index a chunk, replacing any previous postings for the same ID
    pub fn index(&self, chunk_id: &str, text: &str) {
        let _guard = self.write_lock.lock();
        self.remove_locked(chunk_id);

        let tokens = tokenize(text);
        let mut tf: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *tf.entry(token.clone()).or_insert(0) += 1;
        }

        for (term, count) in &tf {
            self.postings
                .entry(term.clone())
                .or_default()
                .insert(chunk_id.to_string(), *count);
        }

        self.total_length
            .fetch_add(tokens.len() as u64, Ordering::SeqCst);
        self.docs.insert(
            chunk_id.to_string(),
            DocEntry {
                length: tokens.len() as u32,
                terms: tf.into_keys().collect(),
            },
        );
    }

    /// Remove a chunk's postings
    pub fn remove(&self, chunk_id: &str) {
        let _guard = self.write_lock.lock();
        self.remove_locked(chunk_id);
    }

    fn remove_locked(&self, chunk_id: &str) {
        let Some((_, entry)) = self.docs.remove(chunk_id) else {
            return;
        };
        for term in &entry.terms {
            let now_empty = match self.postings.get_mut(term) {
                Some(mut list) => {
                    list.remove(chunk_id);
                    list.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.postings.remove_if(term, |_, list| list.is_empty());
            }
        }
        self.total_length
            .fetch_sub(entry.length as u64, Ordering::SeqCst);
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.docs.contains_key(chunk_id)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Number of chunks containing `term`
    pub fn document_frequency(&self, term: &str) -> usize {
        self.postings.get(term).map(|p| p.len()).unwrap_or(0)
    }

    /// Top `limit` chunks by BM25 among those accepted by `filter`
    ///
    /// Sorted by score descending, then chunk ID ascending. Chunks with no
    /// query term are never returned.
    pub fn search<F>(&self, query: &str, limit: usize, filter: F) -> Vec<(String, f32)>
    where
        F: Fn(&str) -> bool,
    {
        let n = self.docs.len();
        if n == 0 || limit == 0 {
            return Vec::new();
        }
        let avg_len = (self.total_length.load(Ordering::SeqCst) as f32 / n as f32).max(1.0);

        let mut terms = tokenize(query);
        terms.sort();
        terms.dedup();

        let mut scores: HashMap<String, f32> = HashMap::new();
        for term in &terms {
            let Some(list) = self.postings.get(term) else {
                continue;
            };
            let df = list.len() as f32;
            let idf = (1.0 + (n as f32 - df + 0.5) / (df + 0.5)).ln();

            for (chunk_id, &tf) in list.iter() {
                if !filter(chunk_id) {
                    continue;
                }
                let len = self.docs.get(chunk_id).map(|d| d.length).unwrap_or(0) as f32;
                let tf = tf as f32;
                let denom = tf + self.k1 * (1.0 - self.b + self.b * len / avg_len);
                *scores.entry(chunk_id.clone()).or_insert(0.0) += idf * tf * (self.k1 + 1.0) / denom;
            }
        }

        let mut ranked: Vec<(String, f32)> = scores.into_iter().filter(|(_, s)| *s > 0.0).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }
}

impl Default for KeywordIndex {
    fn default() -> Self {
        Self::new(1.2, 0.75)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> KeywordIndex {
        let idx = KeywordIndex::default();
        idx.index("c1", "Door fire rating shall be 90 minutes.");
        idx.index("c2", "Insulation R-value shall be R-30 in attic.");
        idx.index("c3", "Fire extinguishers located per code. Fire alarm by others.");
        idx
    }

    #[test]
    fn test_bm25_ranks_matching_chunks() {
        let idx = index();
        let results = idx.search("fire rating", 10, |_| true);
        assert_eq!(results[0].0, "c1");
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, s)| *s > 0.0));
    }

    #[test]
    fn test_filter_and_limit() {
        let idx = index();
        let results = idx.search("fire", 10, |id| id != "c1");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "c3");
        assert_eq!(idx.search("fire", 1, |_| true).len(), 1);
    }

    #[test]
    fn test_reindex_replaces_postings() {
        let idx = index();
        idx.index("c1", "Door fire rating shall be 90 minutes.");
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.document_frequency("door"), 1);

        idx.index("c1", "Hardware finish satin chrome.");
        assert_eq!(idx.document_frequency("door"), 0);
        assert_eq!(idx.document_frequency("hardware"), 1);
        assert!(idx.search("door", 10, |_| true).is_empty());
    }

    #[test]
    fn test_empty_query_and_index() {
        assert!(KeywordIndex::default().search("fire", 5, |_| true).is_empty());
        assert!(index().search("  ", 5, |_| true).is_empty());
    }
}
