//! End-to-end optimization run: baseline, compile, re-evaluate, save.

use super::bootstrap::BootstrapFewShot;
use super::dataset::Example;
use super::evaluate::{EvaluationReport, Evaluator};
use super::metric::{create_metric, MetricKind};
use super::module::OptimizedModule;
use crate::composer::AnswerComposer;
use faqbot_core::{AppError, AppResult};
use faqbot_llm::{LlmClient, RecordingClient};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub trainset: Vec<Example>,
    /// Scored before and after compiling; the trainset stands in when absent
    pub valset: Option<Vec<Example>>,
    pub testset: Option<Vec<Example>>,
    pub save_path: Option<PathBuf>,
    pub metric: MetricKind,
    pub num_threads: usize,
    pub bootstrap: BootstrapFewShot,
}

impl PipelineOptions {
    pub fn new(trainset: Vec<Example>) -> Self {
        Self {
            trainset,
            valset: None,
            testset: None,
            save_path: None,
            metric: MetricKind::SemanticF1,
            num_threads: 4,
            bootstrap: BootstrapFewShot::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub baseline: EvaluationReport,
    pub optimized: EvaluationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<EvaluationReport>,
    pub improvement: f32,
    pub total_cost_usd: f64,
    pub training_examples: usize,
    pub validation_examples: usize,
    pub test_examples: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<PathBuf>,
}

/// Score `baseline`, compile few-shot demos, score again and optionally
/// persist the result.
///
/// Every model call made during the run, including metric judging, goes
/// through one [`RecordingClient`] so the report carries the total cost.
pub async fn run_pipeline(
    baseline: &AnswerComposer,
    options: PipelineOptions,
) -> AppResult<PipelineReport> {
    if options.trainset.is_empty() {
        return Err(AppError::Validation(
            "Optimization needs at least one training example".to_string(),
        ));
    }

    let recorder = Arc::new(RecordingClient::new(Arc::clone(baseline.llm())));
    let llm: Arc<dyn LlmClient> = recorder.clone();
    let baseline = baseline.with_llm(Arc::clone(&llm));

    let metric = create_metric(options.metric, llm, baseline.model());
    let evaluator = Evaluator::new(metric, options.num_threads);

    let eval_set = options
        .valset
        .as_deref()
        .filter(|v| !v.is_empty())
        .unwrap_or(&options.trainset[..]);

    tracing::info!(
        train = options.trainset.len(),
        eval = eval_set.len(),
        metric = options.metric.as_str(),
        "Starting optimization pipeline"
    );

    let baseline_report = evaluator.evaluate(&baseline, eval_set).await;

    let optimized = options
        .bootstrap
        .compile(&baseline, &options.trainset, &evaluator)
        .await?;
    let optimized_report = evaluator.evaluate(&optimized, eval_set).await;

    let test_report = match options.testset.as_deref() {
        Some(testset) if !testset.is_empty() => Some(evaluator.evaluate(&optimized, testset).await),
        _ => None,
    };

    if let Some(path) = &options.save_path {
        OptimizedModule::from_composer(&optimized, options.trainset.len())
            .with_score(optimized_report.average_score, options.metric.as_str())
            .save(path)?;
    }

    let improvement = optimized_report.average_score - baseline_report.average_score;
    let total_cost_usd = recorder.total_cost();

    tracing::info!(
        improvement,
        total_cost_usd,
        calls = recorder.call_count(),
        "Optimization pipeline completed"
    );

    Ok(PipelineReport {
        baseline: baseline_report,
        optimized: optimized_report,
        test: test_report,
        improvement,
        total_cost_usd,
        training_examples: options.trainset.len(),
        validation_examples: options.valset.as_ref().map_or(0, Vec::len),
        test_examples: options.testset.as_ref().map_or(0, Vec::len),
        saved_to: options.save_path,
    })
}
