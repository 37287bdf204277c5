//! OpenAI embedding provider (`POST {endpoint}/v1/embeddings`).

use crate::embeddings::EmbeddingProvider;
use faqbot_core::{AppError, AppResult};
use reqwest::header;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Hosted embeddings client.
#[derive(Debug)]
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    url: String,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbeddings {
    pub fn new(
        endpoint: &str,
        api_key: &str,
        model: &str,
        dimensions: usize,
        timeout: Duration,
    ) -> AppResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| AppError::Config(format!("Invalid API key header: {}", e)))?,
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Embedding(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: format!("{}/v1/embeddings", endpoint.trim_end_matches('/')),
            model: model.to_string(),
            dimensions,
        })
    }
}

/// Order returned rows by their `index` and check the count.
fn into_ordered(mut data: Vec<EmbeddingData>, expected: usize) -> AppResult<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(AppError::Embedding(format!(
            "OpenAI returned {} embeddings for {} inputs",
            data.len(),
            expected
        )));
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(model = %self.model, batch_size = texts.len(), "POST {}", self.url);

        let body = EmbeddingsRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimensions,
        };

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(format!("OpenAI embeddings request timed out: {}", e))
                } else {
                    AppError::Embedding(format!("Failed to send embeddings request: {}", e))
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AppError::Embedding(format!(
                "OpenAI embeddings error ({}): {}",
                status,
                text.trim()
            )));
        }

        let parsed: EmbeddingsResponse = resp.json().await.map_err(|e| {
            AppError::Embedding(format!("Failed to parse embeddings response: {}", e))
        })?;

        into_ordered(parsed.data, texts.len())
    }
}
