//! Ranking parser - best-effort extraction of ranked response labels.
//!
//! Judge models are asked to finish with a `FINAL RANKING:` heading followed
//! by `1. Response A` lines, but they do not reliably honor the format.
//! Extraction therefore degrades in two tiers: numbered entries after the
//! heading first, then any bare `Response X` token anywhere in the text.
//! An empty result is a valid outcome, not an error.

use regex::Regex;
use std::sync::LazyLock;

/// Heading that introduces the structured ranking section. Case-sensitive,
/// colon included.
pub const RANKING_MARKER: &str = "FINAL RANKING:";

/// Matches a numbered ranking entry such as `1. Response A`.
static NUMBERED_ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+\.\s*Response [A-Z]").expect("NUMBERED_ENTRY_RE should compile")
});

/// Matches a bare response label such as `Response A`.
static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Response [A-Z]").expect("LABEL_RE should compile"));

/// Extract ranked labels (`"Response A"`, ...) from a judge's reply, best
/// rank first.
///
/// Tier 1: numbered entries in the section following the first
/// `FINAL RANKING:` marker. Tier 2 (marker absent, or present with no
/// numbered entries after it): every bare label in the whole text, in order
/// of appearance. The loose fallback is a compatibility contract with
/// unstructured judge output; do not tighten it.
pub fn parse_ranking(text: &str) -> Vec<String> {
    if let Some((_, section)) = text.split_once(RANKING_MARKER) {
        let numbered: Vec<String> = NUMBERED_ENTRY_RE
            .find_iter(section)
            .filter_map(|entry| LABEL_RE.find(entry.as_str()))
            .map(|label| label.as_str().to_string())
            .collect();
        if !numbered.is_empty() {
            return numbered;
        }
    }

    LABEL_RE
        .find_iter(text)
        .map(|label| label.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_ranking_extracted_in_order() {
        let text = "Response A is shallow. Response C is thorough.\n\
                    FINAL RANKING:\n1. Response C\n2. Response A\n3. Response B\n";
        assert_eq!(
            parse_ranking(text),
            vec!["Response C", "Response A", "Response B"]
        );
    }

    #[test]
    fn test_fallback_without_marker() {
        let text = "I liked Response B the most, though Response A was close.";
        assert_eq!(parse_ranking(text), vec!["Response B", "Response A"]);
    }

    #[test]
    fn test_marker_without_numbered_entries_scans_whole_text() {
        // The section after the marker has no numbered list, so extraction
        // falls back to every label in the original text, including those
        // before the marker.
        let text = "Response B was weak.\nFINAL RANKING:\nbest was Response A";
        assert_eq!(parse_ranking(text), vec!["Response B", "Response A"]);
    }

    #[test]
    fn test_marker_is_case_sensitive() {
        let text = "final ranking:\n1. Response A\n2. Response B";
        // Lowercase heading is not the marker; the numbered entries still
        // surface through the bare-label fallback.
        assert_eq!(parse_ranking(text), vec!["Response A", "Response B"]);
    }

    #[test]
    fn test_only_first_marker_counts() {
        let text = "FINAL RANKING:\n1. Response B\nFINAL RANKING:\n1. Response A";
        assert_eq!(parse_ranking(text), vec!["Response B", "Response A"]);
    }

    #[test]
    fn test_nonconforming_text_yields_empty() {
        assert!(parse_ranking("no ranking here at all").is_empty());
        assert!(parse_ranking("").is_empty());
    }

    #[test]
    fn test_lowercase_letters_not_labels() {
        assert!(parse_ranking("Response a and Response b").is_empty());
    }

    #[test]
    fn test_whitespace_after_number_optional() {
        let text = "FINAL RANKING:\n1.Response A\n2.   Response B";
        assert_eq!(parse_ranking(text), vec!["Response A", "Response B"]);
    }

    #[test]
    fn test_trailing_prose_on_other_lines_ignored() {
        let text = "FINAL RANKING:\n1. Response C\n2. Response A\n\nOverall a close call.";
        assert_eq!(parse_ranking(text), vec!["Response C", "Response A"]);
    }
}
