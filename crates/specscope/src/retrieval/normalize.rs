//! Per-query score normalization

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How raw sub-index scores are mapped to [0, 1] before blending
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// `(s - min) / (max - min)`; all-equal scores map to 1.0
    #[default]
    MinMax,
    /// `(n - rank) / n` with rank 0 for the best score; ties share a rank
    Rank,
}

impl Normalization {
    /// Normalize the scores one sub-index returned
    ///
    /// Every returned candidate scores above 0 under `Rank`; under `MinMax`
    /// the weakest of several distinct scores maps to exactly 0.
    pub fn apply(&self, scores: &[(String, f32)]) -> HashMap<String, f32> {
        if scores.is_empty() {
            return HashMap::new();
        }
        match self {
            Self::MinMax => min_max(scores),
            Self::Rank => rank(scores),
        }
    }
}

fn min_max(scores: &[(String, f32)]) -> HashMap<String, f32> {
    let min = scores.iter().map(|(_, s)| *s).fold(f32::INFINITY, f32::min);
    let max = scores.iter().map(|(_, s)| *s).fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;

    scores
        .iter()
        .map(|(id, s)| {
            let norm = if range.abs() < f32::EPSILON {
                1.0
            } else {
                ((s - min) / range).clamp(0.0, 1.0)
            };
            (id.clone(), norm)
        })
        .collect()
}

fn rank(scores: &[(String, f32)]) -> HashMap<String, f32> {
    let mut sorted: Vec<&(String, f32)> = scores.iter().collect();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let n = sorted.len() as f32;
    let mut out = HashMap::with_capacity(sorted.len());
    let mut current_rank = 0usize;
    for (i, (id, s)) in sorted.iter().enumerate() {
        if i > 0 && *s < sorted[i - 1].1 {
            current_rank = i;
        }
        out.insert(id.clone(), (n - current_rank as f32) / n);
    }
    out
}
