//! FAQ bot CLI
//!
//! Operator entry point: answer questions through the RAG pipeline and run
//! the offline optimization harness.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, EvaluateCommand, OptimizeCommand, TestModelCommand};
use faqbot_core::logging::{self, LogFormat};
use faqbot_core::{config::AppConfig, AppError, AppResult};
use std::path::PathBuf;

/// FAQ bot - retrieval-augmented customer support answers
#[derive(Parser, Debug)]
#[command(name = "faqbot")]
#[command(about = "Retrieval-augmented customer support answers", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "FAQBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// LLM provider (openai, ollama)
    #[arg(short, long, global = true)]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Number of passages to retrieve
    #[arg(short = 'k', long, global = true)]
    top_k: Option<usize>,

    /// Minimum similarity score for a passage
    #[arg(long, global = true)]
    threshold: Option<f32>,

    /// Saved optimized module to load at startup
    #[arg(long, global = true)]
    optimized_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer one message through the RAG pipeline
    Ask(AskCommand),

    /// Compile few-shot demos from labeled examples and save the result
    Optimize(OptimizeCommand),

    /// Score the composer against a labeled CSV
    Evaluate(EvaluateCommand),

    /// Try a saved optimized module on one query
    TestModel(TestModelCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // --config stands in for FAQBOT_CONFIG; everything else comes from the environment
    let config_path = cli.config.clone();
    let config = AppConfig::load_with(|key| match (key, &config_path) {
        ("FAQBOT_CONFIG", Some(path)) => Some(path.display().to_string()),
        _ => std::env::var(key).ok(),
    })?;

    let config = config.with_overrides(
        cli.provider,
        cli.model,
        cli.top_k,
        cli.threshold,
        cli.optimized_path,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    let format = LogFormat::parse(&config.log_format).ok_or_else(|| {
        AppError::Config(format!("Unknown log format: {}", config.log_format))
    })?;
    logging::init_logging(config.log_level.as_deref(), config.no_color, format)?;

    tracing::info!("FAQ bot CLI starting");
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);
    tracing::debug!("Index: {} ({})", config.index.name, config.index.backend);

    config.validate()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Optimize(_) => "optimize",
        Commands::Evaluate(_) => "evaluate",
        Commands::TestModel(_) => "test-model",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Optimize(cmd) => cmd.execute(&config).await,
        Commands::Evaluate(cmd) => cmd.execute(&config).await,
        Commands::TestModel(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
