//! Core types for trust scoring.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single reflection query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Judgment {
    /// The model chose (A): the proposed answer is correct
    Correct,

    /// The model chose (B): the proposed answer is incorrect
    Incorrect,

    /// The model chose (C): it is not sure
    Unsure,

    /// No choice could be found in the model output
    Unparseable,
}

impl Judgment {
    /// Numeric contribution of this judgment to a score.
    ///
    /// `Unparseable` scores the same as `Unsure`.
    pub fn value(self) -> f64 {
        match self {
            Judgment::Correct => 1.0,
            Judgment::Incorrect => 0.0,
            Judgment::Unsure | Judgment::Unparseable => 0.5,
        }
    }

    /// Map a choice letter (case-insensitive) to a judgment.
    pub fn from_choice(choice: char) -> Option<Self> {
        match choice.to_ascii_uppercase() {
            'A' => Some(Judgment::Correct),
            'B' => Some(Judgment::Incorrect),
            'C' => Some(Judgment::Unsure),
            _ => None,
        }
    }

    /// Whether the judgment came from a recognized choice letter.
    pub fn is_parsed(self) -> bool {
        !matches!(self, Judgment::Unparseable)
    }
}

impl fmt::Display for Judgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Judgment::Correct => write!(f, "CORRECT"),
            Judgment::Incorrect => write!(f, "INCORRECT"),
            Judgment::Unsure => write!(f, "UNSURE"),
            Judgment::Unparseable => write!(f, "UNPARSEABLE"),
        }
    }
}

/// Identity of a memoized judgment.
///
/// Fields are kept separate so that no delimiter inside a question or answer
/// can make two distinct triples collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    question: String,
    answer: String,
    prompt_index: usize,
}

impl CacheKey {
    /// Create a key for one prompt of one question/answer pair.
    pub fn new(question: impl Into<String>, answer: impl Into<String>, prompt_index: usize) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            prompt_index,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn prompt_index(&self) -> usize {
        self.prompt_index
    }
}

/// Trustworthiness of an answer, in `[0, 1]`.
///
/// The arithmetic mean of the judgment values obtained across a reflection
/// prompt set. 1.0 means every prompt judged the answer correct, 0.0 means
/// every prompt judged it incorrect.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrustScore(f64);

impl TrustScore {
    /// Average a set of judgments.
    ///
    /// Returns `None` for an empty slice; a score over no prompts is undefined.
    pub fn from_judgments(judgments: &[Judgment]) -> Option<Self> {
        if judgments.is_empty() {
            return None;
        }

        let total: f64 = judgments.iter().map(|j| j.value()).sum();
        Some(Self(total / judgments.len() as f64))
    }

    /// The score as a plain float.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl From<TrustScore> for f64 {
    fn from(score: TrustScore) -> Self {
        score.0
    }
}

impl fmt::Display for TrustScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}
