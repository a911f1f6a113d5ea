//! Brute-force cosine vector index keyed by chunk ID

use dashmap::DashMap;

use crate::embeddings::cosine_similarity;
use crate::error::{Error, Result};

/// Fixed-dimension vector index
pub struct VectorIndex {
    vectors: DashMap<String, Vec<f32>>,
    dimensions: usize,
}

impl VectorIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            vectors: DashMap::new(),
            dimensions,
        }
    }

    /// Insert or replace the vector for a chunk
    pub fn upsert(&self, chunk_id: &str, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::embedding(format!(
                "Vector for {} has {} dimensions, index expects {}",
                chunk_id,
                vector.len(),
                self.dimensions
            )));
        }
        self.vectors.insert(chunk_id.to_string(), vector);
        Ok(())
    }

    pub fn remove(&self, chunk_id: &str) {
        self.vectors.remove(chunk_id);
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.vectors.contains_key(chunk_id)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Top `limit` chunks by cosine similarity among those accepted by `filter`
    ///
    /// Sorted by similarity descending, then chunk ID ascending.
    pub fn search<F>(&self, query: &[f32], limit: usize, filter: F) -> Vec<(String, f32)>
    where
        F: Fn(&str) -> bool,
    {
        if limit == 0 || query.len() != self.dimensions {
            return Vec::new();
        }

        let mut scored: Vec<(String, f32)> = self
            .vectors
            .iter()
            .filter(|entry| filter(entry.key()))
            .map(|entry| (entry.key().clone(), cosine_similarity(query, entry.value())))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(limit);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_orders_by_similarity() {
        let idx = VectorIndex::new(2);
        idx.upsert("a", vec![1.0, 0.0]).unwrap();
        idx.upsert("b", vec![0.7, 0.7]).unwrap();
        idx.upsert("c", vec![0.0, 1.0]).unwrap();

        let results = idx.search(&[1.0, 0.1], 2, |_| true);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "a");
        assert_eq!(results[1].0, "b");
    }

    #[test]
    fn test_ties_break_on_chunk_id() {
        let idx = VectorIndex::new(2);
        idx.upsert("z", vec![1.0, 0.0]).unwrap();
        idx.upsert("m", vec![1.0, 0.0]).unwrap();
        let results = idx.search(&[1.0, 0.0], 5, |_| true);
        assert_eq!(results[0].0, "m");
        assert_eq!(results[1].0, "z");
    }

    #[test]
    fn test_dimension_mismatch() {
        let idx = VectorIndex::new(3);
        assert!(idx.upsert("a", vec![1.0]).is_err());
        assert!(idx.search(&[1.0], 5, |_| true).is_empty());
    }

    #[test]
    fn test_upsert_replaces() {
        let idx = VectorIndex::new(2);
        idx.upsert("a", vec![1.0, 0.0]).unwrap();
        idx.upsert("a", vec![0.0, 1.0]).unwrap();
        assert_eq!(idx.len(), 1);
        let results = idx.search(&[0.0, 1.0], 1, |_| true);
        assert!((results[0].1 - 1.0).abs() < 1e-6);
    }
}
