//! QA answer cache, invalidated whenever the corpus generation changes

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::CacheConfig;
use crate::types::QaResponse;

/// Cached answer with metadata
#[derive(Debug, Clone)]
struct CachedAnswer {
    response: QaResponse,
    /// Corpus generation the answer was computed against
    generation: u64,
    cached_at: DateTime<Utc>,
    hit_count: u32,
}

/// Answer cache keyed by normalized question, `top_k` and document filter
pub struct AnswerCache {
    entries: RwLock<HashMap<String, CachedAnswer>>,
    enabled: bool,
    max_entries: usize,
    ttl_seconds: u64,
}

impl AnswerCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            enabled: config.enabled,
            max_entries: config.max_entries,
            ttl_seconds: config.ttl_secs,
        }
    }

    /// Cache key: whitespace-collapsed lowercase question plus parameters
    pub fn key(question: &str, top_k: usize, document_filter: Option<&[Uuid]>) -> String {
        let normalized = question
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        hasher.update(top_k.to_le_bytes());
        if let Some(ids) = document_filter {
            let mut ids = ids.to_vec();
            ids.sort_unstable();
            ids.dedup();
            for id in ids {
                hasher.update(id.as_bytes());
            }
        }
        hex::encode(hasher.finalize())
    }

    /// Cached answer for `key` if it is fresh and from `generation`
    pub fn get(&self, key: &str, generation: u64) -> Option<QaResponse> {
        if !self.enabled {
            return None;
        }
        let mut entries = self.entries.write();
        let entry = entries.get_mut(key)?;

        let age = Utc::now().signed_duration_since(entry.cached_at);
        if age.num_seconds().max(0) as u64 > self.ttl_seconds {
            tracing::debug!("Cache miss (TTL expired): {}", &key[..12]);
            entries.remove(key);
            return None;
        }
        if entry.generation != generation {
            tracing::debug!("Cache miss (corpus changed): {}", &key[..12]);
            entries.remove(key);
            return None;
        }

        entry.hit_count += 1;
        tracing::debug!("Cache hit: {} (hits: {})", &key[..12], entry.hit_count);
        Some(entry.response.clone())
    }

    /// Store a complete answer; partial answers are never cached
    pub fn put(&self, key: String, response: &QaResponse, generation: u64) {
        if !self.enabled || response.partial || self.max_entries == 0 {
            return;
        }
        let mut entries = self.entries.write();

        // drop stale generations first, then the oldest entry
        entries.retain(|_, e| e.generation == generation);
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.cached_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            CachedAnswer {
                response: response.clone(),
                generation,
                cached_at: Utc::now(),
                hit_count: 0,
            },
        );
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        tracing::info!("Answer cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read();
        CacheStats {
            entries: entries.len(),
            total_hits: entries.values().map(|e| e.hit_count).sum(),
            max_entries: self.max_entries,
            ttl_seconds: self.ttl_seconds,
        }
    }
}

impl Default for AnswerCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

/// Cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_hits: u32,
    pub max_entries: usize,
    pub ttl_seconds: u64,
}
