//! Reflection prompt templates.
//!
//! A reflection prompt shows the model a question and a proposed answer and
//! asks it to classify the answer as (A) Correct, (B) Incorrect or
//! (C) I am not sure.
//!
//! Templates use two named placeholders, `{question}` and `{answer}`.
//! `{{` and `}}` produce literal braces. Templates are validated when
//! constructed, so rendering can never drop content or fail on a typo.
//!
//! Order in a [`ReflectionPromptSet`] is significant: the index is part of
//! the cache key, and later prompts act as sequential challenges
//! ("are you really sure?") to earlier ones.

use std::fmt;
use thiserror::Error;

/// Placeholder for the question text.
pub const QUESTION_PLACEHOLDER: &str = "question";

/// Placeholder for the proposed answer text.
pub const ANSWER_PLACEHOLDER: &str = "answer";

/// The built-in reflection prompts: an initial judgment, then a challenge.
pub const DEFAULT_REFLECTION_PROMPTS: [&str; 2] = [
    concat!(
        "Question: {question}\n",
        "Proposed Answer: {answer}\n",
        "Is the proposed answer: (A) Correct (B) Incorrect (C) I am not sure.\n",
        "The output should strictly use the following template: \n",
        "explanation: [insert analysis], answer: [choose one letter from among choices A through C]",
    ),
    concat!(
        "Question: {question}\n",
        "Proposed Answer: {answer}\n",
        "Are you really sure the proposed answer is correct? \n",
        "Choose again: (A) Correct (B) Incorrect (C) I am not sure.\n",
        "The output should strictly use the following template: \n",
        "explanation: [insert analysis], answer: [choose one letter from among choices A through C]",
    ),
];

/// Errors from parsing a single template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Template is missing required placeholder '{{{0}}}'")]
    MissingPlaceholder(&'static str),

    #[error("Template contains unknown placeholder '{{{0}}}'")]
    UnknownPlaceholder(String),

    #[error("Template has an unbalanced brace at byte {0}")]
    UnbalancedBrace(usize),
}

/// Errors from building a prompt set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptSetError {
    #[error("Reflection prompt set is empty")]
    Empty,

    #[error("Reflection prompt {index} is invalid: {source}")]
    InvalidTemplate {
        index: usize,
        #[source]
        source: TemplateError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Question,
    Answer,
}

/// A validated reflection prompt template.
#[derive(Clone, PartialEq, Eq)]
pub struct ReflectionPrompt {
    template: String,
    segments: Vec<Segment>,
}

impl ReflectionPrompt {
    /// Parse and validate a template.
    ///
    /// Both `{question}` and `{answer}` must appear at least once. Any other
    /// `{name}` or a stray brace is rejected.
    pub fn new(template: impl Into<String>) -> Result<Self, TemplateError> {
        let template = template.into();
        let segments = parse_segments(&template)?;

        if !segments.contains(&Segment::Question) {
            return Err(TemplateError::MissingPlaceholder(QUESTION_PLACEHOLDER));
        }
        if !segments.contains(&Segment::Answer) {
            return Err(TemplateError::MissingPlaceholder(ANSWER_PLACEHOLDER));
        }

        Ok(Self { template, segments })
    }

    /// Substitute the question and answer.
    pub fn render(&self, question: &str, answer: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + question.len() + answer.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Question => out.push_str(question),
                Segment::Answer => out.push_str(answer),
            }
        }
        out
    }

    /// The template source text.
    pub fn template(&self) -> &str {
        &self.template
    }
}

impl fmt::Debug for ReflectionPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectionPrompt")
            .field("template", &self.template)
            .finish()
    }
}

fn parse_segments(template: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                literal.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                literal.push('}');
            }
            '}' => return Err(TemplateError::UnbalancedBrace(pos)),
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    if inner == '{' {
                        return Err(TemplateError::UnbalancedBrace(pos));
                    }
                    name.push(inner);
                }
                if !closed {
                    return Err(TemplateError::UnbalancedBrace(pos));
                }

                let placeholder = match name.as_str() {
                    QUESTION_PLACEHOLDER => Segment::Question,
                    ANSWER_PLACEHOLDER => Segment::Answer,
                    _ => return Err(TemplateError::UnknownPlaceholder(name)),
                };
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(placeholder);
            }
            _ => literal.push(c),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// An ordered, non-empty collection of reflection prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionPromptSet {
    prompts: Vec<ReflectionPrompt>,
}

impl ReflectionPromptSet {
    /// Build a prompt set from template strings.
    pub fn new<I, S>(templates: I) -> Result<Self, PromptSetError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prompts = templates
            .into_iter()
            .enumerate()
            .map(|(index, template)| {
                ReflectionPrompt::new(template)
                    .map_err(|source| PromptSetError::InvalidTemplate { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_prompts(prompts)
    }

    /// Build a prompt set from already-validated prompts.
    pub fn from_prompts(prompts: Vec<ReflectionPrompt>) -> Result<Self, PromptSetError> {
        if prompts.is_empty() {
            return Err(PromptSetError::Empty);
        }
        Ok(Self { prompts })
    }

    /// Number of prompts. Always at least one.
    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    /// Always false; kept for API symmetry with collections.
    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Prompt at `index`.
    pub fn get(&self, index: usize) -> Option<&ReflectionPrompt> {
        self.prompts.get(index)
    }

    /// Prompts with their indices, in order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ReflectionPrompt)> {
        self.prompts.iter().enumerate()
    }
}

impl Default for ReflectionPromptSet {
    fn default() -> Self {
        let prompts = DEFAULT_REFLECTION_PROMPTS
            .iter()
            .map(|template| {
                ReflectionPrompt::new(*template).expect("built-in reflection prompt is valid")
            })
            .collect();
        Self { prompts }
    }
}
