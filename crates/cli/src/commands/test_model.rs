//! Test-model command handler.
//!
//! Loads a saved optimized module and answers one query with it.

use clap::Args;
use faqbot_core::{config::AppConfig, AppResult};
use faqbot_rag::RagService;
use std::path::PathBuf;

/// Characters of each passage shown in text output.
const PREVIEW_CHARS: usize = 200;

/// Try a saved optimized module on one query
#[derive(Args, Debug)]
pub struct TestModelCommand {
    /// Saved optimized module
    #[arg(long)]
    pub model_path: PathBuf,

    /// Query to answer
    #[arg(long)]
    pub query: String,

    /// Output the full result as JSON
    #[arg(long)]
    pub json: bool,
}

impl TestModelCommand {
    /// Execute the test-model command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing test-model command");

        let mut config = config.clone();
        config.optimized_path = Some(self.model_path.clone());
        let service = RagService::from_config(&config)?;

        let result = service.generate_response(&self.query, None).await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
            return Ok(());
        }

        println!("Query: {}", self.query);
        println!("Status: {}", result.status.as_str());
        println!("Confidence: {:.2}", result.confidence);
        println!();
        println!("Response:\n{}", result.response);
        if !result.reasoning.is_empty() {
            println!();
            println!("Reasoning:\n{}", result.reasoning);
        }
        if !result.contexts.is_empty() {
            println!();
            println!("Contexts:");
            for (i, context) in result.contexts.iter().enumerate() {
                println!(
                    "  {}. [{:.3}] {}",
                    i + 1,
                    context.score,
                    preview(&context.text)
                );
            }
        }

        Ok(())
    }
}

fn preview(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= PREVIEW_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(250);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), PREVIEW_CHARS + 3);
        assert!(shown.ends_with("..."));
        assert_eq!(preview("  short "), "short");
    }
}
