//! Batch evaluation of a composer against labeled examples.

use super::dataset::Example;
use super::metric::Metric;
use crate::composer::{AnswerComposer, ComposerOutcome};
use faqbot_core::AppResult;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Aggregate result of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub average_score: f32,
    pub count: usize,
    pub metric: String,
    pub model: String,
    /// Examples whose composition or scoring failed; they count as 0
    pub failures: usize,
}

/// One example's composer outcome and score.
#[derive(Debug, Clone)]
pub struct ScoredPrediction {
    pub score: f32,
    pub outcome: ComposerOutcome,
}

/// Runs examples through a composer and scores the answers.
#[derive(Clone)]
pub struct Evaluator {
    metric: Arc<dyn Metric>,
    num_threads: usize,
}

impl Evaluator {
    pub fn new(metric: Arc<dyn Metric>, num_threads: usize) -> Self {
        Self {
            metric,
            num_threads: num_threads.max(1),
        }
    }

    pub fn metric(&self) -> &Arc<dyn Metric> {
        &self.metric
    }

    /// Answer and score a single example.
    pub async fn score_example(
        &self,
        composer: &AnswerComposer,
        example: &Example,
    ) -> AppResult<ScoredPrediction> {
        let outcome = composer.answer(&example.question, None).await?;
        let score = self.metric.score(example, &outcome.response).await?;
        Ok(ScoredPrediction { score, outcome })
    }

    /// Score every example, up to `num_threads` at a time.
    ///
    /// Failed examples are logged and score 0. An empty set averages to 0.
    pub async fn evaluate(
        &self,
        composer: &AnswerComposer,
        examples: &[Example],
    ) -> EvaluationReport {
        let start = Instant::now();

        let scores: Vec<Option<f32>> = stream::iter(examples)
            .map(|example| async move {
                match self.score_example(composer, example).await {
                    Ok(scored) => Some(scored.score),
                    Err(e) => {
                        tracing::warn!(
                            question = %example.question,
                            error = %e,
                            "Example failed during evaluation"
                        );
                        None
                    }
                }
            })
            .buffer_unordered(self.num_threads)
            .collect()
            .await;

        let failures = scores.iter().filter(|s| s.is_none()).count();
        let total: f32 = scores.iter().map(|s| s.unwrap_or(0.0)).sum();
        let average_score = if scores.is_empty() {
            0.0
        } else {
            total / scores.len() as f32
        };

        tracing::info!(
            metric = self.metric.name(),
            count = scores.len(),
            failures,
            average_score,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Evaluation complete"
        );

        EvaluationReport {
            average_score,
            count: scores.len(),
            metric: self.metric.name().to_string(),
            model: composer.model().to_string(),
            failures,
        }
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("metric", &self.metric.name())
            .field("num_threads", &self.num_threads)
            .finish()
    }
}
