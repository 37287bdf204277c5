//! Request-serving entry point.
//!
//! A `RagService` is built once per process, before traffic, and then shared
//! read-only (typically behind an `Arc`) by every request handler.

use crate::aggregator;
use crate::composer::{AnswerComposer, ComposerOutcome, ComposerPolicy};
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::index::{IndexFactory, MemoryIndexFactory, PineconeIndexFactory};
use crate::optimize::OptimizedModule;
use crate::retriever::{QueryMode, Retriever, RetrieverConfig};
use crate::types::{ChatMessage, RagResult};
use faqbot_core::{AppConfig, AppError, AppResult};
use faqbot_llm::{create_client, LlmClient};
use faqbot_prompt::PromptProgram;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Build the language model client named by `config`.
pub fn build_llm(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let api_key = config.resolve_api_key();
    create_client(
        &config.provider,
        config.llm_endpoint.as_deref(),
        api_key.as_deref(),
        Duration::from_secs(config.request_timeout_secs),
    )
}

/// Build the retriever, its index factory and, when needed, its embedder.
pub fn build_retriever(config: &AppConfig) -> AppResult<Retriever> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let retriever_config = RetrieverConfig::from_app_config(config)?;

    let needs_embedder =
        config.index.backend == "memory" || retriever_config.query_mode == QueryMode::Vector;
    let embedder: Option<Arc<dyn EmbeddingProvider>> = if needs_embedder {
        let api_key = config.resolve_api_key();
        Some(create_provider(&config.embedding, api_key.as_deref(), timeout)?)
    } else {
        None
    };

    let factory: Arc<dyn IndexFactory> = match config.index.backend.as_str() {
        "pinecone" => {
            let api_key = config.resolve_index_api_key().ok_or_else(|| {
                AppError::Config(format!(
                    "Index API key not found in environment variable: {}",
                    config.index.api_key_env
                ))
            })?;
            Arc::new(PineconeIndexFactory::new(
                api_key,
                config.index.host.clone(),
                timeout,
            ))
        }
        "memory" => {
            let embedder = embedder.clone().ok_or_else(|| {
                AppError::Config("Memory index requires an embedding provider".to_string())
            })?;
            Arc::new(MemoryIndexFactory::new(
                config.index.memory_path.clone(),
                embedder,
            ))
        }
        other => {
            return Err(AppError::Config(format!(
                "Unknown index backend: '{}'. Supported backends: pinecone, memory",
                other
            )))
        }
    };

    let mut retriever = Retriever::new(retriever_config, factory).with_timeout(timeout);
    if let Some(embedder) = embedder {
        retriever = retriever.with_embedder(embedder);
    }
    Ok(retriever)
}

/// Build the baseline composer, applying the saved optimized module when
/// `optimized_path` is set.
pub fn build_composer(config: &AppConfig) -> AppResult<AnswerComposer> {
    let composer = AnswerComposer::new(
        build_retriever(config)?,
        build_llm(config)?,
        &config.model,
        PromptProgram::default_for(&config.answer.domain),
    )
    .with_policy(ComposerPolicy::from_settings(&config.answer)?)
    .with_timeout(Duration::from_secs(config.request_timeout_secs));

    match &config.optimized_path {
        Some(path) => {
            let module = OptimizedModule::load(path)?;
            Ok(AnswerComposer::from_module(&composer, &module))
        }
        None => Ok(composer),
    }
}

/// The answer pipeline behind one call per chat message.
#[derive(Debug, Clone)]
pub struct RagService {
    composer: AnswerComposer,
}

impl RagService {
    pub fn new(composer: AnswerComposer) -> Self {
        Self { composer }
    }

    /// Build every client from configuration.
    ///
    /// A configured optimized module that cannot be loaded fails
    /// construction rather than silently serving the baseline.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let composer = build_composer(config)?;
        tracing::info!(
            provider = %config.provider,
            model = %config.model,
            backend = %config.index.backend,
            index = %config.index.name,
            optimized = config.optimized_path.is_some(),
            "RAG service ready"
        );
        Ok(Self::new(composer))
    }

    pub fn composer(&self) -> &AnswerComposer {
        &self.composer
    }

    /// Answer one chat message. Never fails: every problem is folded into
    /// the returned status.
    pub async fn generate_response(
        &self,
        message: &str,
        history: Option<&[ChatMessage]>,
    ) -> RagResult {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("rag_request", %request_id);

        async move {
            let start = Instant::now();

            let outcome = if message.trim().is_empty() {
                tracing::debug!("Empty message; nothing to answer");
                Ok(ComposerOutcome {
                    response: String::new(),
                    reasoning: String::new(),
                    contexts: Vec::new(),
                })
            } else {
                AssertUnwindSafe(self.composer.answer(message, history))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        Err(AppError::Other("answer pipeline panicked".to_string()))
                    })
            };

            let result = aggregator::finalize(message, outcome);

            tracing::info!(
                status = result.status.as_str(),
                confidence = result.confidence,
                contexts = result.contexts.len(),
                latency_ms = start.elapsed().as_millis() as u64,
                "Request complete"
            );

            result
        }
        .instrument(span)
        .await
    }
}
