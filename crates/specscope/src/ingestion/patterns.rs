//! Construction-document patterns: CSI divisions, addenda, requirement modals, topics

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::document::floor_char_boundary;

/// CSI MasterFormat division or section number ("DIVISION 01", "01 33 00")
pub static CSI_DIVISION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(DIVISION\s+\d{1,2}\b|\b\d{2}\s\d{2}\s\d{2}\b)").expect("valid CSI regex")
});

pub static ADDENDA_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(Addendum|Addenda)\b").expect("valid addenda regex"));

/// Words that mark a sentence as a requirement
pub static REQUIREMENT_MODAL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(shall|must|required)\b").expect("valid modal regex"));

/// Topic tags attached to chunks
pub static TOPIC_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("bonds", r"(?i)\b(bid|performance|payment)\s+bonds?\b"),
        ("insurance", r"(?i)\b(insur\w*|liability|workers'? compensation)\b"),
        ("liquidated_damages", r"(?i)\bliquidated\s+damages\b|\bLD\b"),
        ("submittals", r"(?i)\bsubmittals?\b"),
        ("alternates", r"(?i)\balternates?\b"),
    ]
    .into_iter()
    .filter_map(|(name, pattern)| Regex::new(pattern).ok().map(|re| (name, re)))
    .collect()
});

/// Bytes of a page inspected for a section header
const HEADER_WINDOW: usize = 500;
/// Leading lines considered for an uppercase header
const HEADER_LINES: usize = 5;
const MAX_HEADER_LEN: usize = 120;

/// Detect a section header near the top of a page
///
/// A CSI division/section number wins; otherwise the first short all-caps line
/// among the leading lines.
pub fn detect_section_header(page_text: &str) -> Option<String> {
    let head = &page_text[..floor_char_boundary(page_text, HEADER_WINDOW)];

    if let Some(m) = CSI_DIVISION_REGEX.find(head) {
        return Some(m.as_str().to_string());
    }

    head.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(HEADER_LINES)
        .find(|l| is_upper_line(l) && l.len() < MAX_HEADER_LEN)
        .map(str::to_string)
}

/// At least one cased character and no lowercase ones
fn is_upper_line(line: &str) -> bool {
    line.chars().any(|c| c.is_alphabetic()) && !line.chars().any(|c| c.is_lowercase())
}

/// Topic names matched anywhere in `text`
pub fn detect_topics(text: &str) -> Vec<String> {
    TOPIC_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Whether `text` states a requirement (shall / must / required)
pub fn has_requirement_modal(text: &str) -> bool {
    REQUIREMENT_MODAL_REGEX.is_match(text)
}

/// First CSI division number in `text`, e.g. "01" for "DIVISION 01"
pub fn detect_division(text: &str) -> Option<String> {
    let m = CSI_DIVISION_REGEX.find(text)?;
    let digits: String = m.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
    let division = digits.get(..2).unwrap_or(&digits);
    Some(format!("{:0>2}", division))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_division_header() {
        let text = "DIVISION 01 - GENERAL REQUIREMENTS\nLiquidated damages: $2,000 per day.";
        assert_eq!(detect_section_header(text).as_deref(), Some("DIVISION 01"));
        assert_eq!(detect_division(text).as_deref(), Some("01"));
    }

    #[test]
    fn test_csi_section_number() {
        let text = "Project Manual\nSection 08 71 00 Door Hardware";
        assert_eq!(detect_section_header(text).as_deref(), Some("08 71 00"));
        assert_eq!(detect_division(text).as_deref(), Some("08"));
    }

    #[test]
    fn test_uppercase_fallback() {
        let text = "\n  ADDENDUM 1  \nSubmittals due 14 days after award.";
        assert_eq!(detect_section_header(text).as_deref(), Some("ADDENDUM 1"));
    }

    #[test]
    fn test_no_header() {
        assert_eq!(detect_section_header("just some prose here"), None);
        assert_eq!(detect_section_header("1234\n5678"), None);
    }

    #[test]
    fn test_topics_and_modals() {
        let text = "Contractor shall furnish performance bonds and submittals.";
        let topics = detect_topics(text);
        assert!(topics.contains(&"bonds".to_string()));
        assert!(topics.contains(&"submittals".to_string()));
        assert!(has_requirement_modal(text));
        assert!(!has_requirement_modal("Paint may be applied by roller."));
    }
}
