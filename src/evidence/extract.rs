//! Per-page extracts and the evidence string built from them

use serde::{Deserialize, Serialize};

/// Prefix of the evidence string returned when a question's search could not run
pub const FAILURE_MARKER_PREFIX: &str = "Research failed: ";

/// Separator between page extracts in one evidence string
pub const EXTRACT_SEPARATOR: &str = "\n\n";

/// Visible text of one opened page, capped at a character budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageExtract {
    pub url: String,
    pub text: String,
    /// Whether the page had more text than the budget allowed
    pub truncated: bool,
}

impl PageExtract {
    pub fn new(url: impl Into<String>, raw: &str, max_chars: usize) -> Self {
        let (text, truncated) = truncate_chars(raw, max_chars);
        Self {
            url: url.into(),
            text: text.to_string(),
            truncated,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Cut `text` to at most `max_chars` characters without splitting a code point
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => (&text[..byte_index], true),
        None => (text, false),
    }
}

/// Join non-empty extracts in order; empty input yields an empty string
pub fn join_extracts(extracts: &[PageExtract]) -> String {
    extracts
        .iter()
        .filter(|extract| !extract.is_empty())
        .map(|extract| extract.text.as_str())
        .collect::<Vec<_>>()
        .join(EXTRACT_SEPARATOR)
}

/// Outcome of collecting evidence for one question
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evidence {
    /// Joined page extracts, possibly empty
    Collected(String),
    /// The search could not run; holds the failure-marker string
    SearchFailed(String),
}

impl Evidence {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::SearchFailed(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Collected(text) | Self::SearchFailed(text) => text,
        }
    }

    /// Flatten to the evidence string stored on the session
    pub fn into_string(self) -> String {
        match self {
            Self::Collected(text) | Self::SearchFailed(text) => text,
        }
    }
}

pub fn failure_marker(error: &impl std::fmt::Display) -> String {
    format!("{FAILURE_MARKER_PREFIX}{error}")
}

/// True for evidence strings that look like a failed search
///
/// This is a textual check: scraped page text that happens to begin with
/// `FAILURE_MARKER_PREFIX` matches too. Use [`Evidence::is_failed`] while the outcome
/// is still typed.
pub fn is_failure_marker(evidence: &str) -> bool {
    evidence.starts_with(FAILURE_MARKER_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundary() {
        let text = "héllo wörld";
        assert_eq!(truncate_chars(text, 4), ("héll", true));
        assert_eq!(truncate_chars(text, 11), (text, false));
        assert_eq!(truncate_chars(text, 50), (text, false));
        assert_eq!(truncate_chars(text, 0), ("", true));
    }

    #[test]
    fn page_extract_is_capped() {
        let long = "a".repeat(6000);
        let extract = PageExtract::new("https://example.com", &long, 5000);
        assert_eq!(extract.text.chars().count(), 5000);
        assert!(extract.truncated);
    }

    #[test]
    fn join_skips_blank_extracts() {
        let extracts = vec![
            PageExtract::new("https://a.example", "first", 100),
            PageExtract::new("https://b.example", "   \n", 100),
            PageExtract::new("https://c.example", "third", 100),
        ];
        assert_eq!(join_extracts(&extracts), "first\n\nthird");
        assert_eq!(join_extracts(&[]), "");
    }

    #[test]
    fn marker_round_trip() {
        let marker = failure_marker(&"connection refused");
        assert_eq!(marker, "Research failed: connection refused");
        assert!(is_failure_marker(&marker));
        assert!(!is_failure_marker("page text"));
    }
}
