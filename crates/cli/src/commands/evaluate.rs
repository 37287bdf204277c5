//! Evaluate command handler.

use clap::Args;
use faqbot_core::{config::AppConfig, AppResult};
use faqbot_rag::build_composer;
use faqbot_rag::optimize::{create_metric, load_csv_examples, Evaluator, MetricKind};
use std::path::PathBuf;

/// Score the composer against a labeled CSV
#[derive(Args, Debug)]
pub struct EvaluateCommand {
    /// CSV with question and answer columns
    #[arg(long)]
    pub csv: PathBuf,

    /// Optimized module to evaluate instead of the baseline
    #[arg(long)]
    pub model_path: Option<PathBuf>,

    /// Metric (semantic_f1, token_f1)
    #[arg(long, default_value = "semantic_f1")]
    pub metric: String,

    /// Examples evaluated concurrently
    #[arg(long, default_value_t = 4)]
    pub num_threads: usize,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl EvaluateCommand {
    /// Execute the evaluate command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing evaluate command");
        tracing::debug!("Evaluate options: {:?}", self);

        let kind = MetricKind::parse(&self.metric)?;
        let examples = load_csv_examples(&self.csv)?;

        let mut config = config.clone();
        if let Some(path) = &self.model_path {
            config.optimized_path = Some(path.clone());
        }
        let composer = build_composer(&config)?;

        let metric = create_metric(kind, composer.llm().clone(), composer.model());
        let report = Evaluator::new(metric, self.num_threads)
            .evaluate(&composer, &examples)
            .await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!(
                "{}: {:.3} over {} examples ({} failed, model {})",
                report.metric, report.average_score, report.count, report.failures, report.model
            );
        }

        Ok(())
    }
}
