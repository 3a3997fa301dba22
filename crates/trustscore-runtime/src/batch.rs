//! Sequential batch evaluation.

use trustscore_core::TrustScore;

use crate::engine::ScoringEngine;

/// Scores a sequence of question/answer pairs on one engine.
///
/// Pairs are scored one at a time in input order, so the engine's cache
/// deduplicates repeated pairs within and across batches. Progress events go
/// to `tracing` and never affect the output.
pub struct BatchRunner<'a> {
    engine: &'a ScoringEngine,
    progress: bool,
}

impl<'a> BatchRunner<'a> {
    pub fn new(engine: &'a ScoringEngine) -> Self {
        Self {
            engine,
            progress: false,
        }
    }

    /// Emit an info event per evaluated pair.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Score every pair. Output has the same length and order as `pairs`.
    pub async fn evaluate_all<Q, A>(&self, pairs: &[(Q, A)]) -> Vec<TrustScore>
    where
        Q: AsRef<str>,
        A: AsRef<str>,
    {
        let total = pairs.len();
        let mut scores = Vec::with_capacity(total);

        for (i, (question, answer)) in pairs.iter().enumerate() {
            let score = self.engine.score(question.as_ref(), answer.as_ref()).await;
            if self.progress {
                tracing::info!(completed = i + 1, total, score = score.value(), "Evaluating");
            }
            scores.push(score);
        }

        if self.progress {
            tracing::info!(total, "Evaluated {} Q&A pairs", total);
        }
        scores
    }
}
