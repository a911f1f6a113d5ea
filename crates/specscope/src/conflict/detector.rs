//! Cross-document conflict detection over extracted assertions

use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::extract::{extract_assertions, Assertion, AssertionValue};
use crate::config::ConflictConfig;
use crate::types::{Chunk, Conflict, ConflictKind, ConflictParticipant, Severity};

/// What a subject's assertions are compared on
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Facet {
    Numeric(&'static str),
    Categorical(&'static str),
    Wording,
}

impl Facet {
    fn of(value: &AssertionValue) -> Self {
        match value {
            AssertionValue::Numeric { unit, .. } => Self::Numeric(*unit),
            AssertionValue::Categorical { group, .. } => Self::Categorical(*group),
            AssertionValue::Statement { .. } => Self::Wording,
        }
    }
}

type Groups<'a> = BTreeMap<(String, Facet), Vec<&'a Assertion>>;

/// Result of a full-corpus scan
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub conflicts: Vec<Conflict>,
    pub chunks_examined: usize,
    /// True when cancellation or the timeout cut the scan short
    pub partial: bool,
}

/// Finds numeric, categorical and wording disagreements between documents
#[derive(Debug, Clone, Default)]
pub struct ConflictDetector {
    config: ConflictConfig,
}

impl ConflictDetector {
    pub fn new(config: ConflictConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConflictConfig {
        &self.config
    }

    /// Assertions of `chunks`, in input order
    pub fn extract(&self, chunks: &[Chunk]) -> Vec<Assertion> {
        let statements = self.config.detect_wording;
        chunks
            .par_iter()
            .map(|chunk| extract_assertions(chunk, statements))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }

    /// Conflicts among `chunks`; `filenames` labels participants
    ///
    /// Only assertions from different documents are compared, so a document
    /// never conflicts with itself.
    pub fn detect_conflicts(
        &self,
        chunks: &[Chunk],
        filenames: &HashMap<Uuid, String>,
    ) -> Vec<Conflict> {
        let assertions = self.extract(chunks);
        let groups = group_by_subject(&assertions);
        let conflicts = groups
            .iter()
            .filter_map(|(key, members)| self.compare(key, members, filenames))
            .collect();
        sort_conflicts(conflicts, &document_order(chunks))
    }

    /// Batched, cooperatively cancellable full-corpus detection
    ///
    /// Stops at the next batch boundary once `cancel` fires or `timeout`
    /// elapses. Assertions already extracted are still compared, and the
    /// outcome is marked partial.
    pub async fn scan(
        &self,
        chunks: &[Chunk],
        filenames: &HashMap<Uuid, String>,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> ScanOutcome {
        let deadline = Instant::now() + timeout;
        let stop = || cancel.is_cancelled() || Instant::now() >= deadline;
        let batch_size = self.config.scan_batch_size.max(1);

        let mut partial = false;
        let mut examined = 0;
        let mut assertions = Vec::new();
        for batch in chunks.chunks(batch_size) {
            if stop() {
                partial = true;
                break;
            }
            assertions.extend(self.extract(batch));
            examined += batch.len();
            tokio::task::yield_now().await;
        }

        let groups: Vec<_> = group_by_subject(&assertions).into_iter().collect();
        let mut conflicts = Vec::new();
        for batch in groups.chunks(batch_size) {
            if !partial && stop() {
                partial = true;
                break;
            }
            conflicts.extend(
                batch
                    .iter()
                    .filter_map(|(key, members)| self.compare(key, members, filenames)),
            );
            tokio::task::yield_now().await;
        }

        if partial {
            tracing::warn!(
                "Conflict scan cut short after {} of {} chunks",
                examined,
                chunks.len()
            );
        }

        ScanOutcome {
            conflicts: sort_conflicts(conflicts, &document_order(&chunks[..examined])),
            chunks_examined: examined,
            partial,
        }
    }

    fn compare(
        &self,
        (subject, facet): &(String, Facet),
        members: &[&Assertion],
        filenames: &HashMap<Uuid, String>,
    ) -> Option<Conflict> {
        let mut involved = vec![false; members.len()];
        let mut severity: Option<Severity> = None;

        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                let (a, b) = (members[i], members[j]);
                if a.document_id == b.document_id {
                    continue;
                }
                if let Some(s) = self.disagreement(&a.value, &b.value) {
                    involved[i] = true;
                    involved[j] = true;
                    severity = severity.max(Some(s));
                }
            }
        }
        let severity = severity?;

        let mut seen = HashSet::new();
        let participants: Vec<ConflictParticipant> = members
            .iter()
            .zip(&involved)
            .filter(|(_, hit)| **hit)
            .filter(|(a, _)| seen.insert((a.chunk_id.clone(), a.value.display())))
            .map(|(a, _)| ConflictParticipant {
                document_id: a.document_id,
                filename: filenames.get(&a.document_id).cloned().unwrap_or_default(),
                chunk_id: a.chunk_id.clone(),
                page_number: a.page_number,
                text: a.sentence.clone(),
                value: a.value.display(),
            })
            .collect();

        let kind = match facet {
            Facet::Numeric(_) => ConflictKind::NumericMismatch,
            Facet::Categorical(_) => ConflictKind::CategoricalContradiction,
            Facet::Wording => ConflictKind::WordingDivergence,
        };

        Some(Conflict {
            kind,
            subject: subject.clone(),
            description: describe(kind, subject, &participants),
            severity,
            participants,
        })
    }

    /// Severity of the disagreement between two values, if any
    fn disagreement(&self, a: &AssertionValue, b: &AssertionValue) -> Option<Severity> {
        match (a, b) {
            (
                AssertionValue::Numeric { value: x, unit: u },
                AssertionValue::Numeric { value: y, unit: v },
            ) if u == v => {
                let diff = relative_difference(*x, *y);
                if diff <= self.config.numeric_tolerance {
                    None
                } else if diff > self.config.high_threshold {
                    Some(Severity::High)
                } else {
                    Some(Severity::Medium)
                }
            }
            (
                AssertionValue::Categorical { group: g, term: s },
                AssertionValue::Categorical { group: h, term: t },
            ) if g == h && s != t => Some(Severity::Medium),
            (
                AssertionValue::Statement { terms: s },
                AssertionValue::Statement { terms: t },
            ) if jaccard(s, t) < self.config.wording_threshold => Some(Severity::Low),
            _ => None,
        }
    }
}

/// `|a - b| / max(|a|, |b|)`, 0 when both are 0
pub fn relative_difference(a: f64, b: f64) -> f64 {
    let scale = a.abs().max(b.abs());
    if scale == 0.0 {
        0.0
    } else {
        (a - b).abs() / scale
    }
}

fn jaccard(a: &[String], b: &[String]) -> f64 {
    let a: HashSet<&String> = a.iter().collect();
    let b: HashSet<&String> = b.iter().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

fn group_by_subject(assertions: &[Assertion]) -> Groups<'_> {
    let mut groups: Groups<'_> = BTreeMap::new();
    for a in assertions {
        groups
            .entry((a.subject.clone(), Facet::of(&a.value)))
            .or_default()
            .push(a);
    }
    groups
}

/// Position of each document's first chunk in the input
fn document_order(chunks: &[Chunk]) -> HashMap<Uuid, usize> {
    let mut order = HashMap::new();
    for chunk in chunks {
        let next = order.len();
        order.entry(chunk.document_id).or_insert(next);
    }
    order
}

fn sort_conflicts(mut conflicts: Vec<Conflict>, order: &HashMap<Uuid, usize>) -> Vec<Conflict> {
    let first_seen = |c: &Conflict| {
        c.participants
            .iter()
            .filter_map(|p| order.get(&p.document_id).copied())
            .min()
            .unwrap_or(usize::MAX)
    };
    conflicts.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| first_seen(a).cmp(&first_seen(b)))
            .then_with(|| a.subject.cmp(&b.subject))
            .then_with(|| a.kind.cmp(&b.kind))
    });
    conflicts
}

fn describe(kind: ConflictKind, subject: &str, participants: &[ConflictParticipant]) -> String {
    let sides: Vec<String> = participants
        .iter()
        .map(|p| match &p.value {
            Some(v) => format!("{} ({} p.{})", v, p.filename, p.page_number),
            None => format!("{} p.{}", p.filename, p.page_number),
        })
        .collect();
    match kind {
        ConflictKind::NumericMismatch => {
            format!("Conflicting values for '{}': {}", subject, sides.join(" vs "))
        }
        ConflictKind::CategoricalContradiction => {
            format!("Contradictory terms for '{}': {}", subject, sides.join(" vs "))
        }
        ConflictKind::WordingDivergence => {
            format!("Divergent wording for '{}': {}", subject, sides.join(", "))
        }
    }
}
