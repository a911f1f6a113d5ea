//! Pure confidence functions

use crate::config::ConfidenceConfig;
use crate::index::unique_terms;

/// Inputs to a result's confidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultSignals {
    /// Hybrid score in [0, 1]
    pub hybrid: f32,
    /// Hybrid score minus the next-ranked candidate's (>= 0)
    pub margin: f32,
    /// Fraction of sub-indexes that returned the chunk, in [0, 1]
    pub coverage: f32,
    /// Text states a requirement (shall / must / required)
    pub requirement: bool,
}

/// Calibrates confidence from retrieval signals
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    config: ConfidenceConfig,
}

impl ConfidenceScorer {
    pub fn new(config: ConfidenceConfig) -> Self {
        Self { config }
    }

    /// `clamp(w_h * hybrid + w_m * min(1, margin / sat) + w_c * coverage + boost)`
    ///
    /// Non-decreasing in `hybrid` when the other signals are fixed.
    pub fn score_result(&self, s: &ResultSignals) -> f32 {
        let c = &self.config;
        let margin_term = if c.margin_saturation > 0.0 {
            (s.margin.max(0.0) / c.margin_saturation).min(1.0)
        } else {
            1.0
        };
        let boost = if s.requirement { c.modal_boost } else { 0.0 };

        let raw = c.hybrid_weight * s.hybrid.clamp(0.0, 1.0)
            + c.margin_weight * margin_term
            + c.coverage_weight * s.coverage.clamp(0.0, 1.0)
            + boost;
        raw.clamp(0.0, 1.0)
    }

    /// `min(mean cited confidence, entailment)`; zero citations score 0
    pub fn score_answer(&self, cited_confidences: &[f32], entailment: f32) -> f32 {
        if cited_confidences.is_empty() {
            return 0.0;
        }
        let mean = cited_confidences.iter().sum::<f32>() / cited_confidences.len() as f32;
        mean.min(entailment).clamp(0.0, 1.0)
    }
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(ConfidenceConfig::default())
    }
}

/// Fraction of the claim's key terms found in at least one quote
///
/// A claim with no key terms is fully entailed.
pub fn entailment(claim: &str, quotes: &[&str]) -> f32 {
    let terms = unique_terms(claim);
    if terms.is_empty() {
        return 1.0;
    }
    let quote_terms: Vec<Vec<String>> = quotes.iter().map(|q| unique_terms(q)).collect();
    let found = terms
        .iter()
        .filter(|t| quote_terms.iter().any(|qt| qt.contains(t)))
        .count();
    found as f32 / terms.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn signals(hybrid: f32) -> ResultSignals {
        ResultSignals {
            hybrid,
            margin: 0.1,
            coverage: 0.5,
            requirement: false,
        }
    }

    #[test]
    fn test_weights() {
        let scorer = ConfidenceScorer::default();
        let s = ResultSignals {
            hybrid: 1.0,
            margin: 0.25,
            coverage: 1.0,
            requirement: false,
        };
        assert!((scorer.score_result(&s) - 1.0).abs() < 1e-6);

        let s = ResultSignals {
            hybrid: 0.5,
            margin: 0.0,
            coverage: 0.5,
            requirement: false,
        };
        assert!((scorer.score_result(&s) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_requirement_boost_is_capped() {
        let scorer = ConfidenceScorer::default();
        let mut s = signals(0.5);
        let base = scorer.score_result(&s);
        s.requirement = true;
        assert!((scorer.score_result(&s) - base - 0.05).abs() < 1e-6);

        let full = ResultSignals {
            hybrid: 1.0,
            margin: 1.0,
            coverage: 1.0,
            requirement: true,
        };
        assert_eq!(scorer.score_result(&full), 1.0);
    }

    #[test]
    fn test_answer_confidence() {
        let scorer = ConfidenceScorer::default();
        assert_eq!(scorer.score_answer(&[], 1.0), 0.0);
        assert!((scorer.score_answer(&[0.8, 0.6], 1.0) - 0.7).abs() < 1e-6);
        assert!((scorer.score_answer(&[0.8, 0.6], 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_entailment() {
        assert_eq!(entailment("fire rating 90", &["The fire rating is 90 minutes."]), 1.0);
        assert!((entailment("fire rating steel", &["fire rating"]) - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(entailment("", &[]), 1.0);
    }

    #[test]
    fn test_uncovered_question_caps_answer_confidence() {
        let scorer = ConfidenceScorer::default();
        let quotes = ["Fire rating: 2 hours."];
        let covered = entailment("What is the fire rating?", &quotes);
        let uncovered = entailment("What is the fire rating of the roof hatch?", &quotes);
        assert_eq!(covered, 1.0);
        assert!((uncovered - 0.5).abs() < 1e-6);
        assert_eq!(scorer.score_answer(&[0.9], covered), 0.9);
        assert!((scorer.score_answer(&[0.9], uncovered) - 0.5).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn prop_monotonic_in_hybrid(
            a in 0.0f32..=1.0,
            b in 0.0f32..=1.0,
            margin in 0.0f32..1.0,
            coverage in 0.0f32..=1.0,
            requirement in any::<bool>(),
        ) {
            let scorer = ConfidenceScorer::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let s = |h| ResultSignals { hybrid: h, margin, coverage, requirement };
            let c_lo = scorer.score_result(&s(lo));
            let c_hi = scorer.score_result(&s(hi));
            prop_assert!(c_lo <= c_hi);
            prop_assert!((0.0..=1.0).contains(&c_hi));
        }
    }
}
