//! Embedding provider trait and factory.

use faqbot_core::config::EmbeddingSettings;
use faqbot_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

use super::providers::{MockProvider, OllamaProvider, OpenAiEmbeddings};

/// Trait for embedding providers.
///
/// Implementations must be deterministic for a given model version.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "mock", "openai", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Create an embedding provider from settings.
///
/// `api_key` is only read by hosted providers.
pub fn create_provider(
    settings: &EmbeddingSettings,
    api_key: Option<&str>,
    timeout: Duration,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match settings.provider.as_str() {
        "mock" => Ok(Arc::new(MockProvider::new(settings.dimensions))),

        "ollama" => {
            let base_url = settings
                .endpoint
                .as_deref()
                .unwrap_or(faqbot_llm::providers::ollama::DEFAULT_OLLAMA_URL);
            let provider =
                OllamaProvider::new(base_url, &settings.model, settings.dimensions, timeout)?;
            Ok(Arc::new(provider))
        }

        "openai" => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config("OpenAI embeddings require an API key".to_string())
            })?;
            let base_url = settings
                .endpoint
                .as_deref()
                .unwrap_or(faqbot_llm::providers::openai::DEFAULT_OPENAI_URL);
            let provider = OpenAiEmbeddings::new(
                base_url,
                api_key,
                &settings.model,
                settings.dimensions,
                timeout,
            )?;
            Ok(Arc::new(provider))
        }

        other => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: mock, ollama, openai",
            other
        ))),
    }
}
