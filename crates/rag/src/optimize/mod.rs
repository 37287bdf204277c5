//! Offline optimization harness.
//!
//! Replays labeled question/answer pairs through the composer, scores the
//! answers, searches for better few-shot demos and persists the winning
//! configuration. Unlike the serving path, errors here propagate to the
//! operator.

pub mod bootstrap;
pub mod dataset;
pub mod evaluate;
pub mod metric;
pub mod module;
pub mod pipeline;

pub use bootstrap::BootstrapFewShot;
pub use dataset::{load_csv_examples, prepare_examples, Example};
pub use evaluate::{EvaluationReport, Evaluator, ScoredPrediction};
pub use metric::{create_metric, Metric, MetricKind, SemanticF1, TokenF1};
pub use module::{ModuleMetadata, OptimizedModule};
pub use pipeline::{run_pipeline, PipelineOptions, PipelineReport};
