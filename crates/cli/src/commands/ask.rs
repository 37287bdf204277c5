//! Ask command handler.
//!
//! Answers one message through the full RAG pipeline.

use clap::Args;
use faqbot_core::{config::AppConfig, AppError, AppResult};
use faqbot_rag::{ChatMessage, RagService};
use std::path::{Path, PathBuf};

/// Answer one message through the RAG pipeline
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The customer message
    pub message: Option<String>,

    /// Read the message from a file
    #[arg(short, long, conflicts_with = "message")]
    pub file: Option<PathBuf>,

    /// JSON file with prior turns: [{"role": "user", "content": "..."}]
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Output the full result as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let message = self.get_message()?;
        let history = match &self.history {
            Some(path) => Some(load_history(path)?),
            None => None,
        };

        let service = RagService::from_config(config)?;
        let result = service
            .generate_response(&message, history.as_deref())
            .await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            println!("{}", result.response);

            // Diagnostics go to stderr so stdout holds only the answer
            eprintln!();
            eprintln!(
                "status: {} | confidence: {:.2} | sources: {}",
                result.status.as_str(),
                result.confidence,
                result.contexts.len()
            );
            if !result.reasoning.is_empty() {
                tracing::debug!("Reasoning: {}", result.reasoning);
            }
        }

        Ok(())
    }

    fn get_message(&self) -> AppResult<String> {
        match (&self.message, &self.file) {
            (Some(message), _) => Ok(message.clone()),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                AppError::Config(format!("Failed to read message file {:?}: {}", path, e))
            }),
            (None, None) => Err(AppError::Config("No message provided".to_string())),
        }
    }
}

fn load_history(path: &Path) -> AppResult<Vec<ChatMessage>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("Failed to read history file {:?}: {}", path, e))
    })?;
    let history: Vec<ChatMessage> = serde_json::from_str(&contents)?;
    tracing::debug!("Loaded {} history turns", history.len());
    Ok(history)
}
