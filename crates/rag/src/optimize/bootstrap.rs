//! Few-shot demo search.
//!
//! Runs the baseline composer over the training set and keeps traces whose
//! answers score at or above `pass_threshold` as bootstrapped demos. Remaining
//! slots are filled with raw labeled examples.

use super::dataset::Example;
use super::evaluate::Evaluator;
use crate::composer::AnswerComposer;
use faqbot_core::{AppError, AppResult};
use faqbot_prompt::Demo;

#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapFewShot {
    pub max_bootstrapped_demos: usize,
    pub max_labeled_demos: usize,
    /// Minimum metric score for a trace to become a demo
    pub pass_threshold: f32,
}

impl Default for BootstrapFewShot {
    fn default() -> Self {
        Self {
            max_bootstrapped_demos: 1,
            max_labeled_demos: 3,
            pass_threshold: 0.5,
        }
    }
}

impl BootstrapFewShot {
    pub fn new(max_bootstrapped_demos: usize, max_labeled_demos: usize) -> Self {
        Self {
            max_bootstrapped_demos,
            max_labeled_demos,
            ..Self::default()
        }
    }

    pub fn with_pass_threshold(mut self, threshold: f32) -> Self {
        self.pass_threshold = threshold;
        self
    }

    /// Return a copy of `baseline` whose program carries the selected demos.
    ///
    /// # Errors
    /// `AppError::Validation` when `trainset` is empty.
    pub async fn compile(
        &self,
        baseline: &AnswerComposer,
        trainset: &[Example],
        evaluator: &Evaluator,
    ) -> AppResult<AnswerComposer> {
        if trainset.is_empty() {
            return Err(AppError::Validation(
                "Training set must contain at least one example".to_string(),
            ));
        }

        let mut demos = Vec::new();
        let mut used = vec![false; trainset.len()];

        for (i, example) in trainset.iter().enumerate() {
            if demos.len() >= self.max_bootstrapped_demos {
                break;
            }

            match evaluator.score_example(baseline, example).await {
                Ok(scored) if scored.score >= self.pass_threshold => {
                    tracing::debug!(
                        question = %example.question,
                        score = scored.score,
                        "Bootstrapped demo"
                    );
                    let context = scored
                        .outcome
                        .contexts
                        .iter()
                        .map(|c| c.text.trim())
                        .collect::<Vec<_>>()
                        .join("\n\n");
                    demos.push(Demo {
                        question: example.question.clone(),
                        context: Some(context).filter(|c| !c.is_empty()),
                        reasoning: Some(scored.outcome.reasoning).filter(|r| !r.is_empty()),
                        response: scored.outcome.response,
                    });
                    used[i] = true;
                }
                Ok(scored) => {
                    tracing::debug!(score = scored.score, "Trace below pass threshold");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Bootstrap trace failed");
                }
            }
        }

        let bootstrapped = demos.len();
        let labeled_slots = self.max_labeled_demos.saturating_sub(bootstrapped);

        demos.extend(
            trainset
                .iter()
                .zip(&used)
                .filter(|(_, used)| !**used)
                .take(labeled_slots)
                .map(|(example, _)| Demo::labeled(&example.question, &example.response)),
        );

        tracing::info!(
            bootstrapped,
            labeled = demos.len() - bootstrapped,
            trainset = trainset.len(),
            "Compiled few-shot program"
        );

        Ok(baseline.with_program(baseline.program().with_demos(demos)))
    }
}
