//! Parsing raw model output into a judgment.
//!
//! Reflection prompts ask the model to end with
//! `answer: [choose one letter from among choices A through C]`.
//! Models rarely follow the template exactly, so the parser looks for the
//! first `answer:` marker anywhere in the text and tolerates case changes,
//! bracket styles and surrounding prose.

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::Judgment;

/// Characters of unparsed output included in diagnostics.
pub const DEFAULT_PREVIEW_CHARS: usize = 100;

lazy_static! {
    /// `answer:` + optional whitespace + optional `[`/`(` + A/B/C + optional `]`/`)`
    pub static ref ANSWER_PATTERN: Regex = Regex::new(
        r"(?i)answer:\s*[\[(]?([abc])[\])]?"
    ).unwrap();
}

/// Converts model text into exactly one [`Judgment`].
#[derive(Debug, Clone, Copy)]
pub struct ResponseParser {
    preview_chars: usize,
}

impl ResponseParser {
    /// Create a parser with the default diagnostic preview length.
    pub fn new() -> Self {
        Self {
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }

    /// Set how many characters of unparsed output are logged.
    pub fn with_preview_chars(mut self, preview_chars: usize) -> Self {
        self.preview_chars = preview_chars;
        self
    }

    /// Parse model output. Never fails.
    ///
    /// The first `answer:` match wins; later ones are ignored. Text with no
    /// match yields [`Judgment::Unparseable`] and a warning with a truncated
    /// preview of the text.
    pub fn parse(&self, text: &str) -> Judgment {
        let choice = ANSWER_PATTERN
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().chars().next())
            .and_then(Judgment::from_choice);

        match choice {
            Some(judgment) => judgment,
            None => {
                tracing::warn!(
                    preview = %preview(text, self.preview_chars),
                    length = text.len(),
                    "Could not parse reflection response"
                );
                Judgment::Unparseable
            }
        }
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse model output with the default parser.
pub fn parse_response(text: &str) -> Judgment {
    ResponseParser::new().parse(text)
}

// Truncates on char boundaries so multi-byte text never panics.
fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
