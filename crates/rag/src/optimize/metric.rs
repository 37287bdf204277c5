//! Answer quality metrics.

use super::dataset::Example;
use faqbot_core::{AppError, AppResult};
use faqbot_llm::{LlmClient, LlmRequest};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Scores a predicted answer against an example's reference answer.
#[async_trait::async_trait]
pub trait Metric: Send + Sync {
    fn name(&self) -> &str;

    /// Score in [0, 1]; higher is better.
    async fn score(&self, example: &Example, prediction: &str) -> AppResult<f32>;
}

/// Available metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    SemanticF1,
    TokenF1,
}

impl MetricKind {
    /// # Errors
    /// `AppError::Validation` for unknown metric names.
    pub fn parse(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "semantic_f1" => Ok(Self::SemanticF1),
            "token_f1" => Ok(Self::TokenF1),
            other => Err(AppError::Validation(format!(
                "Unknown metric type: {}. Supported: semantic_f1, token_f1",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SemanticF1 => "semantic_f1",
            Self::TokenF1 => "token_f1",
        }
    }
}

/// Build a metric. The semantic judge uses `llm` with `model`.
pub fn create_metric(kind: MetricKind, llm: Arc<dyn LlmClient>, model: &str) -> Arc<dyn Metric> {
    match kind {
        MetricKind::SemanticF1 => Arc::new(SemanticF1::new(llm, model).decompositional(true)),
        MetricKind::TokenF1 => Arc::new(TokenF1),
    }
}

fn f1(precision: f32, recall: f32) -> f32 {
    if precision + recall <= 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Lexical F1 over lowercase alphanumeric tokens. Deterministic, no model
/// calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenF1;

fn tokens(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        *counts.entry(token.to_string()).or_insert(0) += 1;
    }
    counts
}

#[async_trait::async_trait]
impl Metric for TokenF1 {
    fn name(&self) -> &str {
        "token_f1"
    }

    async fn score(&self, example: &Example, prediction: &str) -> AppResult<f32> {
        let reference = tokens(&example.response);
        let predicted = tokens(prediction);

        let ref_total: usize = reference.values().sum();
        let pred_total: usize = predicted.values().sum();
        if ref_total == 0 || pred_total == 0 {
            return Ok(if ref_total == pred_total { 1.0 } else { 0.0 });
        }

        let overlap: usize = predicted
            .iter()
            .map(|(token, n)| (*n).min(reference.get(token).copied().unwrap_or(0)))
            .sum();

        let precision = overlap as f32 / pred_total as f32;
        let recall = overlap as f32 / ref_total as f32;
        Ok(f1(precision, recall))
    }
}

/// Model-judged semantic recall and precision, combined as F1.
///
/// Recall is the share of the reference's key ideas present in the
/// prediction; precision is the share of the prediction's ideas supported
/// by the reference.
pub struct SemanticF1 {
    llm: Arc<dyn LlmClient>,
    model: String,
    decompositional: bool,
}

#[derive(Debug, Deserialize)]
struct Judgement {
    recall: f32,
    precision: f32,
}

impl SemanticF1 {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            decompositional: false,
        }
    }

    /// Ask the judge to list key ideas before scoring.
    pub fn decompositional(mut self, enabled: bool) -> Self {
        self.decompositional = enabled;
        self
    }

    fn judge_prompt(&self, example: &Example, prediction: &str) -> String {
        let steps = if self.decompositional {
            "First list the key ideas in the ground truth and in the system response. \
             Then decide which ideas overlap."
        } else {
            "Compare the two answers directly."
        };

        format!(
            "Compare a system response to the ground truth for the question below.\n\
             {steps}\n\
             recall: fraction of the ground truth covered by the system response.\n\
             precision: fraction of the system response supported by the ground truth.\n\
             Finish with a single JSON object: {{\"recall\": <0..1>, \"precision\": <0..1>}}\n\n\
             Question: {question}\n\nGround truth: {truth}\n\nSystem response: {prediction}",
            steps = steps,
            question = example.question.trim(),
            truth = example.response.trim(),
            prediction = prediction.trim(),
        )
    }
}

/// Read the last JSON object in the judge's output.
fn parse_judgement(content: &str) -> AppResult<Judgement> {
    let start = content.rfind('{');
    let end = content.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &content[s..=e],
        _ => {
            return Err(AppError::Llm(
                "Judge output contained no JSON object".to_string(),
            ))
        }
    };

    let judgement: Judgement = serde_json::from_str(json)
        .map_err(|e| AppError::Llm(format!("Failed to parse judge output: {}", e)))?;

    Ok(Judgement {
        recall: judgement.recall.clamp(0.0, 1.0),
        precision: judgement.precision.clamp(0.0, 1.0),
    })
}

#[async_trait::async_trait]
impl Metric for SemanticF1 {
    fn name(&self) -> &str {
        "semantic_f1"
    }

    async fn score(&self, example: &Example, prediction: &str) -> AppResult<f32> {
        if prediction.trim().is_empty() {
            return Ok(0.0);
        }

        let request = LlmRequest::new(self.judge_prompt(example, prediction), &self.model)
            .with_system("You are a strict grader of customer support answers.")
            .with_temperature(0.0);

        let response = self.llm.complete(&request).await?;
        let judgement = parse_judgement(&response.content)?;

        tracing::debug!(
            recall = judgement.recall,
            precision = judgement.precision,
            "Semantic F1 judgement"
        );

        Ok(f1(judgement.precision, judgement.recall))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faqbot_llm::{LlmResponse, LlmUsage};

    struct Judge(&'static str);

    #[async_trait::async_trait]
    impl LlmClient for Judge {
        fn provider_name(&self) -> &str {
            "judge"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            Ok(LlmResponse {
                content: self.0.to_string(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
                cost: None,
            })
        }
    }

    fn example() -> Example {
        Example::new("What are your hours?", "We are open 9am to 5pm on weekdays")
    }

    #[test]
    fn test_metric_kind_parse() {
        assert_eq!(MetricKind::parse("semantic_f1").unwrap(), MetricKind::SemanticF1);
        assert_eq!(MetricKind::parse("TOKEN_F1").unwrap().as_str(), "token_f1");
        assert!(matches!(
            MetricKind::parse("composite"),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_token_f1() {
        let metric = TokenF1;
        let exact = metric
            .score(&example(), "We are open 9am to 5pm on weekdays")
            .await
            .unwrap();
        assert!((exact - 1.0).abs() < 1e-6);

        let partial = metric.score(&example(), "open weekdays").await.unwrap();
        assert!(partial > 0.0 && partial < 1.0);

        let none = metric.score(&example(), "").await.unwrap();
        assert_eq!(none, 0.0);
    }

    #[tokio::test]
    async fn test_semantic_f1_parses_trailing_json() {
        let judge = Arc::new(Judge(
            "Key ideas: hours {weekdays}.\n{\"recall\": 0.5, \"precision\": 1.0}",
        ));
        let metric = SemanticF1::new(judge, "gpt-4o-mini").decompositional(true);
        let score = metric.score(&example(), "Open weekdays").await.unwrap();
        assert!((score - 2.0 / 3.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_semantic_f1_rejects_unparseable_output() {
        let metric = SemanticF1::new(Arc::new(Judge("looks fine to me")), "m");
        assert!(metric.score(&example(), "Open weekdays").await.is_err());
    }

    #[test]
    fn test_judgement_clamped() {
        let j = parse_judgement(r#"{"recall": 1.4, "precision": -0.2}"#).unwrap();
        assert_eq!(j.recall, 1.0);
        assert_eq!(j.precision, 0.0);
    }

    #[test]
    fn test_decompositional_prompt() {
        let metric = SemanticF1::new(Arc::new(Judge("")), "m").decompositional(true);
        assert!(metric
            .judge_prompt(&example(), "x")
            .contains("list the key ideas"));
    }
}
