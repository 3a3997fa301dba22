//! # trustscore-core
//!
//! Deterministic building blocks for self-reflection trust scoring.
//!
//! A language model is shown a question together with a proposed answer and
//! asked whether the answer is correct. Its replies are parsed into discrete
//! [`Judgment`]s and averaged into a [`TrustScore`] in `[0, 1]`.
//!
//! This crate covers everything that does not touch a model:
//! - Reflection prompt templates with validated placeholders
//! - Parsing raw model text into a judgment
//! - Aggregating judgments into a score
//! - The typed cache key used to memoize judgments
//!
//! ## Key Guarantees
//!
//! 1. **No LLM calls**: all functions here are pure
//! 2. **Total parsing**: any text maps to exactly one judgment
//! 3. **Bounded scores**: every score lies in `[0, 1]`
//!
//! ## Example
//!
//! ```rust
//! use trustscore_core::{parse_response, Judgment, ReflectionPromptSet, TrustScore};
//!
//! let prompts = ReflectionPromptSet::default();
//! let rendered = prompts.get(0).unwrap().render("What is 2+2?", "4");
//! assert!(rendered.contains("Proposed Answer: 4"));
//!
//! let judgments = [parse_response("answer: [A]"), parse_response("answer: [C]")];
//! assert_eq!(judgments[0], Judgment::Correct);
//! assert_eq!(TrustScore::from_judgments(&judgments).unwrap().value(), 0.75);
//! ```

pub mod parser;
pub mod prompts;
pub mod types;

pub use parser::{parse_response, ResponseParser};
pub use prompts::{
    PromptSetError, ReflectionPrompt, ReflectionPromptSet, TemplateError, DEFAULT_REFLECTION_PROMPTS,
};
pub use types::{CacheKey, Judgment, TrustScore};
