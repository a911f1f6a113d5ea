//! Configuration for the SpecScope engine

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::retrieval::Normalization;

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SpecScopeConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Text chunking configuration
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Hybrid retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Confidence scoring weights
    pub confidence: ConfidenceConfig,
    /// Conflict detection policy
    pub conflicts: ConflictConfig,
    /// Question answering configuration
    pub qa: QaConfig,
    /// Background processing configuration
    pub processing: ProcessingConfig,
    /// Snapshot persistence
    pub storage: StorageConfig,
    /// Answer cache
    pub cache: CacheConfig,
}

impl SpecScopeConfig {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config '{}': {}", path.display(), e))
        })?;
        let mut config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config '{}': {}", path.display(), e)))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from `SPECSCOPE_CONFIG` if set, otherwise use defaults
    pub fn from_env() -> Result<Self> {
        match std::env::var("SPECSCOPE_CONFIG") {
            Ok(path) => Self::load(path),
            Err(_) => {
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("SPECSCOPE_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!("Ignoring invalid SPECSCOPE_PORT: {}", port),
            }
        }
        if let Ok(url) = std::env::var("SPECSCOPE_OLLAMA_URL") {
            self.embeddings.backend = EmbeddingBackend::Ollama;
            self.embeddings.ollama_url = url;
        }
    }

    /// Reject out-of-range values
    pub fn validate(&self) -> Result<()> {
        fn unit(name: &str, v: f32) -> Result<()> {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(Error::Config(format!("{} must be in [0, 1], got {}", name, v)))
            }
        }

        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be > 0".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(
                "chunking.chunk_overlap must be smaller than chunk_size".to_string(),
            ));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embeddings.dimensions must be > 0".to_string()));
        }
        if self.retrieval.candidate_multiplier == 0 {
            return Err(Error::Config(
                "retrieval.candidate_multiplier must be >= 1".to_string(),
            ));
        }
        unit("retrieval.default_alpha", self.retrieval.default_alpha)?;
        unit("qa.alpha", self.qa.alpha)?;
        unit("qa.min_confidence", self.qa.min_confidence)?;
        unit("confidence.hybrid_weight", self.confidence.hybrid_weight)?;
        unit("confidence.margin_weight", self.confidence.margin_weight)?;
        unit("confidence.coverage_weight", self.confidence.coverage_weight)?;
        if self.conflicts.high_threshold < self.conflicts.numeric_tolerance {
            return Err(Error::Config(
                "conflicts.high_threshold must be >= numeric_tolerance".to_string(),
            ));
        }
        if self.processing.index_retry_attempts == 0 {
            return Err(Error::Config(
                "processing.index_retry_attempts must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 200MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 200 * 1024 * 1024,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in bytes (~300 tokens at 4 chars/token)
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in bytes
    pub chunk_overlap: usize,
    /// A chunk end snaps back to a newline only if it stays this far past the start
    pub newline_min_offset: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1200,
            chunk_overlap: 200,
            newline_min_offset: 50,
        }
    }
}

/// Which embedding backend to use
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Deterministic feature-hashing embedder (offline, no model download)
    #[default]
    Hashing,
    /// Ollama HTTP embeddings
    Ollama,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend selection
    pub backend: EmbeddingBackend,
    /// Embedding dimensions (fixed for the whole index)
    pub dimensions: usize,
    /// Ollama base URL
    pub ollama_url: String,
    /// Ollama embedding model
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Hashing,
            dimensions: 256,
            ollama_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Hybrid retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates fetched per sub-index = multiplier * top_k
    pub candidate_multiplier: usize,
    /// Per-query score normalization before blending
    pub normalization: Normalization,
    /// Alpha used when a request does not carry one
    pub default_alpha: f32,
    /// Snippet window in bytes around the first highlight
    pub snippet_window: usize,
    /// BM25 term saturation
    pub bm25_k1: f32,
    /// BM25 length normalization
    pub bm25_b: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_multiplier: 4,
            normalization: Normalization::MinMax,
            default_alpha: 0.5,
            snippet_window: 200,
            bm25_k1: 1.2,
            bm25_b: 0.75,
        }
    }
}

/// Confidence scoring weights
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Weight of the hybrid score
    pub hybrid_weight: f32,
    /// Weight of the margin to the next-ranked candidate
    pub margin_weight: f32,
    /// Weight of sub-index agreement
    pub coverage_weight: f32,
    /// Margin at which the margin term saturates to 1.0
    pub margin_saturation: f32,
    /// Boost for chunks stating a requirement (shall/must/required)
    pub modal_boost: f32,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            hybrid_weight: 0.6,
            margin_weight: 0.2,
            coverage_weight: 0.2,
            margin_saturation: 0.25,
            modal_boost: 0.05,
        }
    }
}

/// Conflict detection policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictConfig {
    /// Relative numeric difference below which values are considered equal
    pub numeric_tolerance: f64,
    /// Relative numeric difference above which a mismatch is `high`
    pub high_threshold: f64,
    /// Report low-severity wording divergence on the same subject
    pub detect_wording: bool,
    /// Token Jaccard similarity below which wording is considered divergent
    pub wording_threshold: f64,
    /// Chunks per batch during a full-corpus scan
    pub scan_batch_size: usize,
    /// Full-corpus scan timeout in seconds
    pub scan_timeout_secs: u64,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            numeric_tolerance: 0.01,
            high_threshold: 0.10,
            detect_wording: false,
            wording_threshold: 0.2,
            scan_batch_size: 256,
            scan_timeout_secs: 30,
        }
    }
}

/// Question answering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    /// Blend weight used for QA retrieval
    pub alpha: f32,
    /// Candidates below this confidence are never used as evidence
    pub min_confidence: f32,
    /// Maximum number of quoted sentences in an answer
    pub max_sentences: usize,
    /// QA timeout in seconds
    pub timeout_secs: u64,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            min_confidence: 0.35,
            max_sentences: 3,
            timeout_secs: 30,
        }
    }
}

/// Background processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Documents ingested concurrently (default: CPU count, max 8)
    pub parallel_documents: Option<usize>,
    /// Concurrent embedding requests per document (default: CPU count, max 4)
    pub parallel_embeddings: Option<usize>,
    /// Timeout for ingesting a single document
    pub document_timeout_secs: u64,
    /// Attempts for transient index failures
    pub index_retry_attempts: u32,
    /// Base backoff between attempts in milliseconds (doubled each attempt)
    pub index_retry_base_ms: u64,
    /// Pages beyond this limit are ignored
    pub max_pages_per_upload: usize,
    /// Maximum accepted file size in bytes
    pub max_file_size: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_documents: None,
            parallel_embeddings: None,
            document_timeout_secs: 300,
            index_retry_attempts: 3,
            index_retry_base_ms: 100,
            max_pages_per_upload: 3000,
            max_file_size: 200 * 1024 * 1024,
        }
    }
}

impl ProcessingConfig {
    /// Effective document concurrency
    pub fn document_workers(&self) -> usize {
        self.parallel_documents
            .unwrap_or_else(|| num_cpus::get().min(8))
            .max(1)
    }

    /// Effective embedding concurrency
    pub fn embedding_workers(&self) -> usize {
        self.parallel_embeddings
            .unwrap_or_else(|| num_cpus::get().min(4))
            .max(1)
    }
}

/// Snapshot persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Persist documents and chunks after each completed ingestion
    pub persist: bool,
    /// Snapshot file location
    pub snapshot_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let snapshot_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("specscope")
            .join("snapshot.json");

        Self {
            persist: false,
            snapshot_path,
        }
    }
}

/// Answer cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable QA answer caching
    pub enabled: bool,
    /// Maximum cached answers
    pub max_entries: usize,
    /// Entry time-to-live in seconds
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1000,
            ttl_secs: 3600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        assert!(SpecScopeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[retrieval]
normalization = "rank"
candidate_multiplier = 6

[conflicts]
high_threshold = 0.2
"#
        )
        .unwrap();

        let config = SpecScopeConfig::load(file.path()).unwrap();
        assert_eq!(config.retrieval.normalization, Normalization::Rank);
        assert_eq!(config.retrieval.candidate_multiplier, 6);
        assert!((config.conflicts.high_threshold - 0.2).abs() < 1e-9);
        // untouched sections keep their defaults
        assert_eq!(config.chunking.chunk_size, 1200);
    }

    #[test]
    fn test_rejects_bad_alpha() {
        let mut config = SpecScopeConfig::default();
        config.qa.alpha = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_overlap_larger_than_chunk() {
        let mut config = SpecScopeConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(config.validate().is_err());
    }
}
