//! Optimize command handler.
//!
//! Runs the few-shot optimization pipeline over CSV datasets.

use clap::Args;
use faqbot_core::{config::AppConfig, AppResult};
use faqbot_rag::build_composer;
use faqbot_rag::optimize::{
    load_csv_examples, run_pipeline, BootstrapFewShot, MetricKind, PipelineOptions,
    PipelineReport,
};
use std::path::PathBuf;

/// Compile few-shot demos from labeled examples and save the result
#[derive(Args, Debug)]
pub struct OptimizeCommand {
    /// Training CSV with question and answer columns
    #[arg(long)]
    pub train_csv: PathBuf,

    /// Validation CSV scored before and after optimizing
    #[arg(long)]
    pub val_csv: PathBuf,

    /// Optional held-out test CSV
    #[arg(long)]
    pub test_csv: Option<PathBuf>,

    /// Where to write the optimized module
    #[arg(long, default_value = "models/optimized_rag.json")]
    pub save_path: PathBuf,

    /// Metric (semantic_f1, token_f1)
    #[arg(long, default_value = "semantic_f1")]
    pub metric: String,

    /// Examples evaluated concurrently
    #[arg(long, default_value_t = 4)]
    pub num_threads: usize,

    /// Demos taken from passing model traces
    #[arg(long, default_value_t = 1)]
    pub max_bootstrapped_demos: usize,

    /// Total demo budget, filled with labeled examples after bootstrapping
    #[arg(long, default_value_t = 3)]
    pub max_labeled_demos: usize,

    /// Minimum metric score for a trace to become a demo
    #[arg(long, default_value_t = 0.5)]
    pub pass_threshold: f32,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl OptimizeCommand {
    /// Execute the optimize command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing optimize command");
        tracing::debug!("Optimize options: {:?}", self);

        let metric = MetricKind::parse(&self.metric)?;

        let trainset = load_csv_examples(&self.train_csv)?;
        let valset = load_csv_examples(&self.val_csv)?;
        let testset = match &self.test_csv {
            Some(path) => Some(load_csv_examples(path)?),
            None => None,
        };

        // Always start from the unoptimized baseline
        let mut baseline_config = config.clone();
        baseline_config.optimized_path = None;
        let baseline = build_composer(&baseline_config)?;

        let options = PipelineOptions {
            trainset,
            valset: Some(valset),
            testset,
            save_path: Some(self.save_path.clone()),
            metric,
            num_threads: self.num_threads,
            bootstrap: BootstrapFewShot::new(self.max_bootstrapped_demos, self.max_labeled_demos)
                .with_pass_threshold(self.pass_threshold),
        };

        let report = run_pipeline(&baseline, options).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }

        Ok(())
    }
}

fn print_report(report: &PipelineReport) {
    println!("Optimization complete ({})", report.optimized.metric);
    println!(
        "  Examples:  {} train, {} validation, {} test",
        report.training_examples, report.validation_examples, report.test_examples
    );
    println!("  Baseline:  {:.3}", report.baseline.average_score);
    println!("  Optimized: {:.3}", report.optimized.average_score);
    println!("  Change:    {:+.3}", report.improvement);
    if let Some(test) = &report.test {
        println!("  Test:      {:.3}", test.average_score);
    }
    println!("  Cost:      ${:.4}", report.total_cost_usd);
    if let Some(path) = &report.saved_to {
        println!("  Saved to:  {}", path.display());
    }
}
