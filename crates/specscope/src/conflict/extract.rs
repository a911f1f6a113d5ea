//! Assertion extraction: (subject, value) pairs stated in chunk text

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use crate::index::tokenize;
use crate::ingestion::patterns::{has_requirement_modal, CSI_DIVISION_REGEX};
use crate::types::document::floor_char_boundary;
use crate::types::Chunk;

/// Content words kept in an attribute phrase
const ATTRIBUTE_WORDS: usize = 2;

/// Words that never form part of an attribute phrase
static FILLER: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "shall", "must", "will", "should", "may", "have", "provide", "provided", "furnish",
        "furnished", "install", "installed", "minimum", "maximum", "min", "max", "least",
        "less", "more", "not", "exceed", "exceeding", "equal", "approximately", "approx",
        "each", "all", "any", "total", "no", "nominal", "required", "optional", "being",
        "also", "only", "up",
    ]
    .into_iter()
    .collect()
});

/// `$2,000` / `90` / `1.5`
static NUMBER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\$\s?)?(\d{1,3}(?:,\d{3})+|\d+)(\.\d+)?").expect("valid number regex")
});

/// `R-30`, `R30`
static R_VALUE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bR-?(\d+(?:\.\d+)?)\b").expect("valid R-value regex"));

/// Mutually exclusive categorical groups: (group, [(pattern, canonical term)])
///
/// Within a group longer phrases come first so "not required" wins over "required".
static CATEGORY_GROUPS: Lazy<Vec<(&'static str, Regex, Vec<(&'static str, &'static str)>)>> =
    Lazy::new(|| {
        let groups: Vec<(&'static str, Vec<(&'static str, &'static str)>)> = vec![
            (
                "requirement",
                vec![
                    ("not required", "not required"),
                    ("optional", "optional"),
                    ("required", "required"),
                ],
            ),
            (
                "inclusion",
                vec![
                    ("not included", "excluded"),
                    ("excluded", "excluded"),
                    ("included", "included"),
                ],
            ),
            (
                "permission",
                vec![
                    ("not permitted", "prohibited"),
                    ("not allowed", "prohibited"),
                    ("prohibited", "prohibited"),
                    ("permitted", "permitted"),
                    ("allowed", "permitted"),
                ],
            ),
            (
                "location",
                vec![("interior", "interior"), ("exterior", "exterior")],
            ),
            (
                "material",
                vec![
                    ("hollow metal", "steel"),
                    ("steel", "steel"),
                    ("aluminum", "aluminum"),
                    ("aluminium", "aluminum"),
                    ("wood", "wood"),
                    ("fiberglass", "fiberglass"),
                    ("vinyl", "vinyl"),
                ],
            ),
        ];

        groups
            .into_iter()
            .filter_map(|(name, terms)| {
                let alternation = terms
                    .iter()
                    .map(|(p, _)| p.replace(' ', r"\s+"))
                    .collect::<Vec<_>>()
                    .join("|");
                Regex::new(&format!(r"(?i)\b({})\b", alternation))
                    .ok()
                    .map(|re| (name, re, terms))
            })
            .collect()
    });

/// What an assertion states about its subject
#[derive(Debug, Clone, PartialEq)]
pub enum AssertionValue {
    /// Quantity in canonical units
    Numeric { value: f64, unit: &'static str },
    /// Term from a closed group of mutually exclusive terms
    Categorical {
        group: &'static str,
        term: &'static str,
    },
    /// Requirement sentence without an extractable value
    Statement { terms: Vec<String> },
}

impl AssertionValue {
    /// Human-readable value
    pub fn display(&self) -> Option<String> {
        match self {
            Self::Numeric { value, unit } => Some(format!("{} {}", format_number(*value), unit)),
            Self::Categorical { term, .. } => Some(term.to_string()),
            Self::Statement { .. } => None,
        }
    }
}

/// One (subject, value) statement found in a chunk
#[derive(Debug, Clone, PartialEq)]
pub struct Assertion {
    pub chunk_id: String,
    pub document_id: Uuid,
    pub page_number: u32,
    /// Normalized subject key: CSI section (when known) and attribute phrase
    pub subject: String,
    pub value: AssertionValue,
    /// Sentence carrying the assertion
    pub sentence: String,
}

/// Extract every assertion in a chunk
///
/// Wording statements are only produced when `statements` is set.
pub fn extract_assertions(chunk: &Chunk, statements: bool) -> Vec<Assertion> {
    let section_key = chunk.section.as_deref().and_then(section_key);
    let mut out = Vec::new();

    for sentence in chunk.text.split_sentence_bounds() {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        let mut found = Vec::new();
        extract_numeric(sentence, &mut found);
        extract_categorical(sentence, &mut found);

        if found.is_empty() && statements && has_requirement_modal(sentence) {
            if let Some(attribute) = statement_subject(sentence) {
                found.push((
                    attribute,
                    AssertionValue::Statement {
                        terms: tokenize(sentence)
                            .into_iter()
                            .filter(|w| is_attribute_word(w))
                            .collect(),
                    },
                ));
            }
        }

        for (attribute, value) in found {
            out.push(Assertion {
                chunk_id: chunk.id.clone(),
                document_id: chunk.document_id,
                page_number: chunk.page_number,
                subject: subject_key(section_key.as_deref(), &attribute),
                value,
                sentence: sentence.to_string(),
            });
        }
    }

    out
}

/// CSI designation of a section header, e.g. "08 71 00" or "division 08"
pub fn section_key(section: &str) -> Option<String> {
    let m = CSI_DIVISION_REGEX.find(section)?;
    Some(
        m.as_str()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase(),
    )
}

fn subject_key(section: Option<&str>, attribute: &str) -> String {
    match section {
        Some(s) => format!("{} / {}", s, attribute),
        None => attribute.to_string(),
    }
}

fn extract_numeric(sentence: &str, found: &mut Vec<(String, AssertionValue)>) {
    let mut cursor = 0;
    let mut r_spans = Vec::new();

    for caps in R_VALUE_REGEX.captures_iter(sentence) {
        let (Some(whole), Some(num)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        r_spans.push((whole.start(), whole.end()));
        let Ok(value) = num.as_str().parse::<f64>() else {
            continue;
        };
        if let Some(attribute) = attribute_before(&sentence[cursor..whole.start()]) {
            found.push((attribute, AssertionValue::Numeric { value, unit: "R" }));
        }
        cursor = whole.end();
    }

    let mut cursor = 0;
    for caps in NUMBER_REGEX.captures_iter(sentence) {
        let Some(whole) = caps.get(0) else { continue };
        if r_spans.iter().any(|&(s, e)| whole.start() >= s && whole.start() < e) {
            continue;
        }
        let digits = format!(
            "{}{}",
            caps.get(2).map(|m| m.as_str()).unwrap_or(""),
            caps.get(3).map(|m| m.as_str()).unwrap_or("")
        )
        .replace(',', "");
        let Ok(raw) = digits.parse::<f64>() else { continue };

        let (unit, (num, den), unit_end) = if caps.get(1).is_some() {
            ("USD", (1.0, 1.0), whole.end())
        } else {
            match unit_after(&sentence[whole.end()..]) {
                Some((unit, factor, len)) => (unit, factor, whole.end() + len),
                None => continue,
            }
        };

        let start = cursor.min(whole.start());
        if let Some(attribute) = attribute_before(&sentence[start..whole.start()]) {
            found.push((
                attribute,
                AssertionValue::Numeric {
                    value: raw * num / den,
                    unit,
                },
            ));
        }
        cursor = unit_end;
    }
}

/// Scale to the canonical unit as (numerator, denominator)
type Scale = (f64, f64);

/// Unit word right after a number: (canonical unit, scale, bytes consumed)
fn unit_after(rest: &str) -> Option<(&'static str, Scale, usize)> {
    let skipped = rest.len() - rest.trim_start_matches([' ', '-']).len();
    let tail = &rest[skipped..];

    if tail.starts_with('%') {
        return Some(("%", (1.0, 1.0), skipped + 1));
    }
    if tail.starts_with('"') {
        return Some(("in", (1.0, 1.0), skipped + 1));
    }

    let word_len = tail
        .char_indices()
        .find(|(_, c)| !(c.is_alphabetic() || *c == '°'))
        .map(|(i, _)| i)
        .unwrap_or(tail.len());
    let word = tail[..word_len].to_lowercase();
    let after = &tail[word_len..];

    let (unit, scale) = match word.as_str() {
        "hours" | "hour" | "hrs" | "hr" | "h" => ("h", (1.0, 1.0)),
        "minutes" | "minute" | "mins" | "min" => ("h", (1.0, 60.0)),
        "days" | "day" => ("day", (1.0, 1.0)),
        "calendar" | "working" | "business" => {
            let next = after.trim_start();
            if next.to_lowercase().starts_with("day") {
                let day_len = next
                    .char_indices()
                    .find(|(_, c)| !c.is_alphabetic())
                    .map(|(i, _)| i)
                    .unwrap_or(next.len());
                let consumed = word_len + (after.len() - next.len()) + day_len;
                return Some(("day", (1.0, 1.0), skipped + consumed));
            }
            return None;
        }
        "weeks" | "week" => ("day", (7.0, 1.0)),
        "inches" | "inch" => ("in", (1.0, 1.0)),
        "in" if after.starts_with('.') => ("in", (1.0, 1.0)),
        "feet" | "foot" | "ft" => ("in", (12.0, 1.0)),
        "mm" | "millimeters" | "millimetres" => ("in", (1.0, 25.4)),
        "psi" => ("psi", (1.0, 1.0)),
        "psf" => ("psf", (1.0, 1.0)),
        "percent" => ("%", (1.0, 1.0)),
        "°f" | "degrees" | "deg" => ("°F", (1.0, 1.0)),
        "lbs" | "lb" | "pounds" => ("lb", (1.0, 1.0)),
        "gauge" | "ga" => ("ga", (1.0, 1.0)),
        "stc" => ("STC", (1.0, 1.0)),
        _ => return None,
    };
    Some((unit, scale, skipped + word_len))
}

fn extract_categorical(sentence: &str, found: &mut Vec<(String, AssertionValue)>) {
    for (group, re, terms) in CATEGORY_GROUPS.iter() {
        let matches: Vec<regex::Match> = re.find_iter(sentence).collect();
        let Some(first) = matches.first() else {
            continue;
        };

        let canonical = |m: &regex::Match| -> Option<&'static str> {
            let normalized = m
                .as_str()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase();
            terms
                .iter()
                .find(|(p, _)| *p == normalized)
                .map(|(_, term)| *term)
        };

        let Some(term) = canonical(first) else { continue };
        // a sentence naming two different terms of one group states neither
        if matches.iter().any(|m| canonical(m) != Some(term)) {
            continue;
        }
        if let Some(attribute) = attribute_before(&sentence[..first.start()]) {
            found.push((
                attribute,
                AssertionValue::Categorical {
                    group: *group,
                    term,
                },
            ));
        }
    }
}

/// Last content words before a value, within the current clause
fn attribute_before(text: &str) -> Option<String> {
    let clause = text.rsplit(';').next().unwrap_or(text);
    let words: Vec<String> = tokenize(clause)
        .into_iter()
        .filter(|w| is_attribute_word(w))
        .collect();
    if words.is_empty() {
        return None;
    }
    let start = words.len().saturating_sub(ATTRIBUTE_WORDS);
    Some(words[start..].join(" "))
}

/// Content words before the requirement modal
fn statement_subject(sentence: &str) -> Option<String> {
    let lower = sentence.to_lowercase();
    let modal = ["shall", "must", "required"]
        .iter()
        .filter_map(|m| lower.find(m))
        .min()?;
    attribute_before(&sentence[..floor_char_boundary(sentence, modal)])
}

fn is_attribute_word(word: &str) -> bool {
    !FILLER.contains(word) && !word.chars().any(|c| c.is_ascii_digit())
}

fn format_number(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{}", rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, section: Option<&str>) -> Chunk {
        Chunk::new(Uuid::new_v4(), text, 1, 0, text.len(), 0)
            .with_section(section.map(str::to_string))
    }

    fn values(text: &str) -> Vec<(String, AssertionValue)> {
        extract_assertions(&chunk(text, None), false)
            .into_iter()
            .map(|a| (a.subject, a.value))
            .collect()
    }

    #[test]
    fn test_numeric_with_units() {
        assert_eq!(
            values("Fire rating: 2 hours."),
            vec![(
                "fire rating".to_string(),
                AssertionValue::Numeric { value: 2.0, unit: "h" }
            )]
        );
        assert_eq!(
            values("Doors shall have a fire rating of 90 minutes."),
            vec![(
                "fire rating".to_string(),
                AssertionValue::Numeric { value: 1.5, unit: "h" }
            )]
        );
    }

    #[test]
    fn test_currency_and_calendar_days() {
        let v = values("Liquidated damages: $2,000 per calendar day.");
        assert_eq!(
            v,
            vec![(
                "liquidated damages".to_string(),
                AssertionValue::Numeric { value: 2000.0, unit: "USD" }
            )]
        );
        let v = values("Submittals due within 14 calendar days after award.");
        assert_eq!(
            v[0].1,
            AssertionValue::Numeric { value: 14.0, unit: "day" }
        );
    }

    #[test]
    fn test_r_value() {
        let v = values("Attic insulation shall be R-30.");
        assert_eq!(
            v,
            vec![(
                "attic insulation".to_string(),
                AssertionValue::Numeric { value: 30.0, unit: "R" }
            )]
        );
    }

    #[test]
    fn test_bare_numbers_are_ignored() {
        assert!(values("Refer to Section 08 71 00 and item 4.").is_empty());
    }

    #[test]
    fn test_categorical() {
        assert_eq!(
            values("Backflow preventer is not required."),
            vec![(
                "backflow preventer".to_string(),
                AssertionValue::Categorical { group: "requirement", term: "not required" }
            )]
        );
        assert_eq!(
            values("Door frames shall be hollow metal."),
            vec![(
                "door frames".to_string(),
                AssertionValue::Categorical { group: "material", term: "steel" }
            )]
        );
    }

    #[test]
    fn test_mixed_terms_in_one_sentence_are_skipped() {
        assert!(values("Frames may be steel or aluminum.").is_empty());
    }

    #[test]
    fn test_section_key_in_subject() {
        let c = chunk("Fire rating: 1 hour.", Some("SECTION 08 11 13 HOLLOW METAL DOORS"));
        let a = extract_assertions(&c, false);
        assert_eq!(a[0].subject, "08 11 13 / fire rating");
        assert_eq!(section_key("ADDENDUM 1"), None);
    }

    #[test]
    fn test_statements_only_when_enabled() {
        let text = "Contractor shall coordinate all work with the owner.";
        assert!(extract_assertions(&chunk(text, None), false).is_empty());
        let a = extract_assertions(&chunk(text, None), true);
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].subject, "contractor");
        assert!(matches!(a[0].value, AssertionValue::Statement { .. }));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            AssertionValue::Numeric { value: 1.5, unit: "h" }.display().as_deref(),
            Some("1.5 h")
        );
        assert_eq!(
            AssertionValue::Numeric { value: 2000.0, unit: "USD" }.display().as_deref(),
            Some("2000 USD")
        );
    }
}
