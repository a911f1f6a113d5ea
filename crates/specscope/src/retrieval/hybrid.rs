//! Hybrid retriever: blends normalized keyword and vector scores

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use super::normalize::Normalization;
use super::snippet::build_snippet;
use crate::config::RetrievalConfig;
use crate::error::{Error, Result};
use crate::index::Indexer;
use crate::ingestion::patterns::has_requirement_modal;
use crate::scoring::{ConfidenceScorer, ResultSignals};
use crate::store::ChunkStore;
use crate::types::query::{validate_alpha, validate_top_k};
use crate::types::{ScoreBreakdown, SearchResult};

/// Number of sub-indexes contributing candidates
const SUB_INDEXES: f32 = 2.0;

/// A ranked candidate before it is turned into a `SearchResult`
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub chunk_id: String,
    pub scores: ScoreBreakdown,
    /// Fraction of sub-indexes that returned this chunk
    pub coverage: f32,
    /// Hybrid score minus the next candidate's
    pub margin: f32,
}

/// `alpha * vector + (1 - alpha) * keyword`, exact at both ends
pub fn blend(alpha: f32, vector: f32, keyword: f32) -> f32 {
    if alpha == 0.0 {
        keyword
    } else if alpha == 1.0 {
        vector
    } else {
        alpha * vector + (1.0 - alpha) * keyword
    }
}

/// Merge, blend and rank sub-index candidates
///
/// Ordering: hybrid desc, vector desc, chunk_id asc. A candidate missing from
/// a sub-index scores 0 for it. Every candidate is returned; callers truncate.
pub fn rank_candidates(
    keyword: &[(String, f32)],
    vector: &[(String, f32)],
    alpha: f32,
    normalization: Normalization,
) -> Vec<RankedCandidate> {
    let kw_norm = normalization.apply(keyword);
    let vec_norm = normalization.apply(vector);

    let ids: BTreeMap<&str, ()> = keyword
        .iter()
        .chain(vector.iter())
        .map(|(id, _)| (id.as_str(), ()))
        .collect();

    let mut ranked: Vec<RankedCandidate> = ids
        .keys()
        .map(|id| {
            let k = kw_norm.get(*id).copied();
            let v = vec_norm.get(*id).copied();
            let coverage = (k.is_some() as u8 + v.is_some() as u8) as f32 / SUB_INDEXES;
            let (k, v) = (k.unwrap_or(0.0), v.unwrap_or(0.0));
            RankedCandidate {
                chunk_id: id.to_string(),
                scores: ScoreBreakdown {
                    vector: v,
                    keyword: k,
                    hybrid: blend(alpha, v, k),
                },
                coverage,
                margin: 0.0,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.scores
            .hybrid
            .total_cmp(&a.scores.hybrid)
            .then_with(|| b.scores.vector.total_cmp(&a.scores.vector))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });

    for i in 0..ranked.len() {
        let next = ranked.get(i + 1).map(|c| c.scores.hybrid).unwrap_or(0.0);
        ranked[i].margin = (ranked[i].scores.hybrid - next).max(0.0);
    }

    ranked
}

/// Ranked results of one retrieval
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub results: Vec<SearchResult>,
    /// Vector side unavailable; results are keyword-only
    pub degraded: bool,
}

/// Hybrid keyword + vector retriever
pub struct HybridRetriever {
    store: Arc<ChunkStore>,
    indexer: Arc<Indexer>,
    config: RetrievalConfig,
    scorer: ConfidenceScorer,
}

impl HybridRetriever {
    pub fn new(
        store: Arc<ChunkStore>,
        indexer: Arc<Indexer>,
        config: RetrievalConfig,
        scorer: ConfidenceScorer,
    ) -> Self {
        Self {
            store,
            indexer,
            config,
            scorer,
        }
    }

    /// Top `top_k` chunks for `query` with `alpha` weighting the vector side
    ///
    /// Blank queries yield no results whatever the other parameters, as do
    /// empty corpora. `document_filter` restricts results to the given
    /// documents. When the query cannot be embedded the search falls back to
    /// keyword candidates only and the outcome is marked degraded; at
    /// `alpha == 0` the query is never embedded.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        alpha: f32,
        document_filter: Option<&[Uuid]>,
    ) -> Result<Retrieval> {
        if query.trim().is_empty() {
            return Ok(Retrieval::default());
        }
        validate_top_k(top_k)?;
        validate_alpha(alpha)?;

        let keyword_index = self.indexer.keyword();
        let vector_index = self.indexer.vector();
        if keyword_index.is_empty() && vector_index.is_empty() {
            return Ok(Retrieval::default());
        }

        let allowed: Option<HashSet<Uuid>> = document_filter.map(|ids| ids.iter().copied().collect());
        let accept = |chunk_id: &str| match self.store.document_of(chunk_id) {
            Some(doc_id) => {
                allowed.as_ref().map_or(true, |set| set.contains(&doc_id))
                    && self.store.is_searchable(&doc_id)
            }
            None => false,
        };

        let pool = top_k.saturating_mul(self.config.candidate_multiplier.max(1));
        let keyword = keyword_index.search(query, pool, &accept);
        let mut degraded = false;
        let vector = if vector_index.is_empty() || alpha == 0.0 {
            Vec::new()
        } else {
            match self.indexer.embed_query(query).await {
                Ok(embedding) => vector_index.search(&embedding, pool, &accept),
                Err(e @ (Error::Embedding(_) | Error::IndexUnavailable(_) | Error::Http(_))) => {
                    tracing::warn!("Query embedding failed, keyword-only search: {}", e);
                    degraded = true;
                    Vec::new()
                }
                Err(e) => return Err(e),
            }
        };

        let ranked = rank_candidates(&keyword, &vector, alpha, self.config.normalization);
        tracing::debug!(
            "Hybrid search '{}': {} keyword + {} vector candidates -> {} merged",
            query,
            keyword.len(),
            vector.len(),
            ranked.len()
        );

        let results = ranked
            .into_iter()
            .take(top_k)
            .filter_map(|candidate| self.to_result(query, candidate))
            .collect();
        Ok(Retrieval { results, degraded })
    }

    fn to_result(&self, query: &str, candidate: RankedCandidate) -> Option<SearchResult> {
        let chunk = self.store.get_chunk(&candidate.chunk_id).ok()?;
        let filename = self.store.filename(&chunk.document_id).unwrap_or_default();

        let confidence = self.scorer.score_result(&ResultSignals {
            hybrid: candidate.scores.hybrid,
            margin: candidate.margin,
            coverage: candidate.coverage,
            requirement: has_requirement_modal(&chunk.text),
        });
        let snippet = build_snippet(&chunk.text, query, self.config.snippet_window);

        let mut result = SearchResult::from_chunk(&chunk, filename, candidate.scores);
        result.confidence = confidence;
        result.snippet = snippet.text;
        result.highlights = snippet.highlights;
        result.highlight_spans = snippet.spans;
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &[(&str, f32)]) -> Vec<(String, f32)> {
        v.iter().map(|(id, x)| (id.to_string(), *x)).collect()
    }

    #[test]
    fn test_blend_extremes_are_exact() {
        assert_eq!(blend(0.0, 0.3, 0.7), 0.7);
        assert_eq!(blend(1.0, 0.3, 0.7), 0.3);
        assert!((blend(0.5, 0.2, 0.6) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_missing_component_scores_zero() {
        let ranked = rank_candidates(
            &s(&[("a", 5.0), ("b", 1.0)]),
            &s(&[("c", 0.9), ("a", 0.1)]),
            0.5,
            Normalization::MinMax,
        );
        let b = ranked.iter().find(|c| c.chunk_id == "b").unwrap();
        assert_eq!(b.scores.vector, 0.0);
        assert_eq!(b.coverage, 0.5);
        let a = ranked.iter().find(|c| c.chunk_id == "a").unwrap();
        assert_eq!(a.coverage, 1.0);
    }

    #[test]
    fn test_tie_breaks() {
        // equal hybrid, higher vector wins; then lower chunk id
        let ranked = rank_candidates(
            &s(&[("k", 2.0), ("x", 1.0)]),
            &s(&[("v", 0.8), ("y", 0.2)]),
            0.5,
            Normalization::MinMax,
        );
        let order: Vec<&str> = ranked.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(order, vec!["v", "k", "x", "y"]);
    }

    #[test]
    fn test_margins() {
        let ranked = rank_candidates(&s(&[("a", 3.0), ("b", 2.0), ("c", 1.0)]), &[], 0.0, Normalization::MinMax);
        assert!((ranked[0].margin - 0.5).abs() < 1e-6);
        assert!((ranked[1].margin - 0.5).abs() < 1e-6);
        assert_eq!(ranked[2].margin, 0.0);
    }
}
