//! Extractive, citation-grounded question answering

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use super::citation::{cite, format_answer, validate_citation};
use crate::config::QaConfig;
use crate::error::{Error, Result};
use crate::index::{tokenize, unique_terms};
use crate::retrieval::HybridRetriever;
use crate::scoring::{entailment, ConfidenceScorer};
use crate::store::ChunkStore;
use crate::types::{Chunk, Citation, QaResponse, SearchResult};

/// A sentence that shares key terms with the question
#[derive(Debug, Clone)]
struct Candidate {
    /// Index into the kept search results
    result: usize,
    start: usize,
    end: usize,
    overlap: usize,
    confidence: f32,
}

/// Byte ranges of trimmed, non-empty sentences in `text`
pub fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    text.split_sentence_bound_indices()
        .filter_map(|(offset, sentence)| {
            let trimmed = sentence.trim();
            if trimmed.is_empty() {
                return None;
            }
            let start = offset + (sentence.len() - sentence.trim_start().len());
            Some((start, start + trimmed.len()))
        })
        .collect()
}

/// Answers questions by quoting the best-matching sentences
pub struct QaSynthesizer {
    retriever: Arc<HybridRetriever>,
    store: Arc<ChunkStore>,
    config: QaConfig,
    scorer: ConfidenceScorer,
}

impl QaSynthesizer {
    pub fn new(
        retriever: Arc<HybridRetriever>,
        store: Arc<ChunkStore>,
        config: QaConfig,
        scorer: ConfidenceScorer,
    ) -> Self {
        Self {
            retriever,
            store,
            config,
            scorer,
        }
    }

    /// Answer `question` from the top `top_k` retrieved chunks
    ///
    /// Abstains when no candidate reaches `min_confidence` or no sentence
    /// shares a key term with the question. When `cancel` fires or `timeout`
    /// elapses the sentences gathered so far are returned with `partial` set.
    pub async fn answer(
        &self,
        question: &str,
        top_k: usize,
        document_filter: Option<&[Uuid]>,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Result<QaResponse> {
        if question.trim().is_empty() {
            return Err(Error::validation("question must not be empty"));
        }
        let deadline = Instant::now() + timeout;

        let retrieval = tokio::select! {
            _ = cancel.cancelled() => return Ok(QaResponse::abstain().into_partial()),
            _ = tokio::time::sleep_until(deadline) => return Ok(QaResponse::abstain().into_partial()),
            retrieval = self.retriever.search(question, top_k, self.config.alpha, document_filter) => retrieval?,
        };
        let degraded = retrieval.degraded;

        let kept: Vec<SearchResult> = retrieval
            .results
            .into_iter()
            .filter(|r| r.confidence >= self.config.min_confidence)
            .collect();
        if kept.is_empty() {
            tracing::debug!("No evidence above {} for '{}'", self.config.min_confidence, question);
            return Ok(QaResponse::abstain().with_degraded(degraded));
        }

        let key_terms: HashSet<String> = unique_terms(question).into_iter().collect();
        let mut chunks: Vec<Chunk> = Vec::with_capacity(kept.len());
        let mut candidates = Vec::new();
        let mut partial = false;

        for (i, result) in kept.iter().enumerate() {
            if cancel.is_cancelled() || Instant::now() >= deadline {
                partial = true;
                break;
            }
            let chunk = self.store.get_chunk(&result.chunk_id)?;
            for (start, end) in sentence_spans(&chunk.text) {
                let overlap = tokenize(&chunk.text[start..end])
                    .into_iter()
                    .collect::<HashSet<_>>()
                    .intersection(&key_terms)
                    .count();
                if overlap > 0 {
                    candidates.push(Candidate {
                        result: i,
                        start,
                        end,
                        overlap,
                        confidence: result.confidence,
                    });
                }
            }
            chunks.push(chunk);
        }

        let response = self
            .compose(question, &kept, &chunks, candidates)
            .with_degraded(degraded);
        Ok(if partial {
            response.into_partial()
        } else {
            response
        })
    }

    fn compose(
        &self,
        question: &str,
        kept: &[SearchResult],
        chunks: &[Chunk],
        mut candidates: Vec<Candidate>,
    ) -> QaResponse {
        candidates.sort_by(|a, b| {
            b.overlap
                .cmp(&a.overlap)
                .then_with(|| b.confidence.total_cmp(&a.confidence))
                .then_with(|| a.result.cmp(&b.result))
                .then_with(|| a.start.cmp(&b.start))
        });

        let mut seen_quotes = HashSet::new();
        let mut clauses = Vec::new();
        let mut citations: Vec<Citation> = Vec::new();
        let mut cited_results: Vec<usize> = Vec::new();

        for c in candidates {
            if clauses.len() >= self.config.max_sentences {
                break;
            }
            let chunk = &chunks[c.result];
            let quote = &chunk.text[c.start..c.end];
            if !seen_quotes.insert(quote.to_string()) {
                continue;
            }
            let Some(citation) = cite(chunk, &kept[c.result].filename, c.start, c.end) else {
                continue;
            };
            if !validate_citation(&citation, chunk) {
                tracing::warn!("Dropping citation that does not match chunk {}", chunk.id);
                continue;
            }
            clauses.push((citation.quote.clone(), citations.len() + 1));
            citations.push(citation);
            if !cited_results.contains(&c.result) {
                cited_results.push(c.result);
            }
        }

        if citations.is_empty() {
            return QaResponse::abstain();
        }

        // quotes are verbatim, so entailment is measured against what was asked
        let quotes: Vec<&str> = citations.iter().map(|c| c.quote.as_str()).collect();
        let cited_confidences: Vec<f32> = cited_results.iter().map(|&i| kept[i].confidence).collect();
        let confidence = self
            .scorer
            .score_answer(&cited_confidences, entailment(question, &quotes));

        cited_results.sort_unstable();
        QaResponse {
            answer: format_answer(&clauses),
            citations,
            confidence,
            used_chunks: cited_results.into_iter().map(|i| kept[i].clone()).collect(),
            abstained: false,
            partial: false,
            degraded: false,
            processing_time_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_spans_are_trimmed_slices() {
        let text = "  Doors shall be rated.  Frames are steel.\n\nEnd";
        let spans = sentence_spans(text);
        let sentences: Vec<&str> = spans.iter().map(|&(s, e)| &text[s..e]).collect();
        assert_eq!(sentences, vec!["Doors shall be rated.", "Frames are steel.", "End"]);
    }

    #[test]
    fn test_sentence_spans_of_blank_text() {
        assert!(sentence_spans("   \n ").is_empty());
    }
}
