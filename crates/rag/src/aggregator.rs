//! Final result assembly.
//!
//! `finalize` is the last stop of every request: it turns a composer
//! outcome or failure into a well-formed [`RagResult`] and never panics.

use crate::composer::ComposerOutcome;
use crate::types::{RagResult, RagStatus, SearchResult};
use faqbot_core::AppResult;

/// Response used when no passage cleared the threshold.
pub const NO_CONTEXT_MESSAGE: &str = "I apologize, but I don't have specific information about that topic. Please contact our customer support team for assistance.";

/// Reasoning used when no passage cleared the threshold.
pub const NO_CONTEXT_REASONING: &str =
    "No relevant passages were found in the knowledge base for this question.";

/// Response used when the request failed.
pub const ERROR_MESSAGE: &str = "I apologize, but I'm having trouble processing your request right now. Please try again later or contact customer support.";

/// Mean score of `contexts`; 0.0 when empty or not a finite number.
pub fn confidence(contexts: &[SearchResult]) -> f32 {
    if contexts.is_empty() {
        return 0.0;
    }
    let sum: f64 = contexts.iter().map(|c| c.score as f64).sum();
    let mean = (sum / contexts.len() as f64) as f32;
    if mean.is_finite() {
        mean
    } else {
        0.0
    }
}

/// Classify a composer outcome and package the final result.
pub fn finalize(question: &str, outcome: AppResult<ComposerOutcome>) -> RagResult {
    match outcome {
        Ok(outcome) if outcome.contexts.is_empty() => {
            tracing::info!(status = "no_context", "Request finalized");
            RagResult {
                response: NO_CONTEXT_MESSAGE.to_string(),
                reasoning: NO_CONTEXT_REASONING.to_string(),
                contexts: Vec::new(),
                confidence: 0.0,
                status: RagStatus::NoContext,
            }
        }
        Ok(outcome) => {
            let confidence = confidence(&outcome.contexts);
            tracing::info!(
                status = "success",
                contexts = outcome.contexts.len(),
                confidence,
                "Request finalized"
            );
            RagResult {
                response: outcome.response,
                reasoning: outcome.reasoning,
                contexts: outcome.contexts,
                confidence,
                status: RagStatus::Success,
            }
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                timeout = e.is_timeout(),
                question_chars = question.chars().count(),
                "Request failed"
            );
            RagResult {
                response: ERROR_MESSAGE.to_string(),
                reasoning: String::new(),
                contexts: Vec::new(),
                confidence: 0.0,
                status: RagStatus::Error,
            }
        }
    }
}
