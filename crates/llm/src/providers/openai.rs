//! OpenAI chat completion provider.
//!
//! Minimal non-streaming client around `POST {endpoint}/v1/chat/completions`.
//! Every response is priced from its token usage so callers can account
//! for spend across a run.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use crate::types::ModelPricing;
use faqbot_core::{AppError, AppResult};
use reqwest::header;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Public OpenAI API endpoint.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Maximum characters of an error body kept in messages.
const SNIPPET_LEN: usize = 300;

/// OpenAI chat client.
#[derive(Debug)]
pub struct OpenAiClient {
    client: reqwest::Client,
    url_chat: String,
}

impl OpenAiClient {
    /// Create a client for `endpoint` authenticated with `api_key`.
    ///
    /// # Errors
    /// - `AppError::Config` if the key is empty or the endpoint is not http(s)
    /// - `AppError::Llm` if the HTTP client cannot be built
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> AppResult<Self> {
        if api_key.trim().is_empty() {
            return Err(AppError::Config(
                "OpenAI provider requires API key".to_string(),
            ));
        }

        let endpoint = endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "Invalid OpenAI endpoint: {}",
                endpoint
            )));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| AppError::Config(format!("Invalid API key header: {}", e)))?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to create HTTP client: {}", e)))?;

        let base = endpoint.trim_end_matches('/');
        let url_chat = format!("{}/v1/chat/completions", base);

        info!(endpoint = %base, timeout_secs = timeout.as_secs(), "OpenAiClient initialized");

        Ok(Self { client, url_chat })
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let started = Instant::now();
        let body = ChatCompletionRequest::from_request(request);

        debug!(
            model = %request.model,
            prompt_len = request.prompt.len(),
            has_system = request.system.is_some(),
            "POST {}", self.url_chat
        );

        let resp = self
            .client
            .post(&self.url_chat)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(format!("OpenAI request timed out: {}", e))
                } else {
                    AppError::Llm(format!("Failed to send request to OpenAI: {}", e))
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);

            error!(
                %status,
                %snippet,
                model = %request.model,
                latency_ms = started.elapsed().as_millis(),
                "OpenAI /v1/chat/completions returned non-success status"
            );

            return Err(AppError::Llm(format!(
                "OpenAI API error ({}): {}",
                status, snippet
            )));
        }

        let out: ChatCompletionResponse = resp.json().await.map_err(|e| {
            AppError::Llm(format!(
                "Failed to parse OpenAI response: {}; expected `choices[0].message.content`",
                e
            ))
        })?;

        let content = out
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .ok_or_else(|| AppError::Llm("OpenAI returned no choices".to_string()))?;

        let model = out.model.unwrap_or_else(|| request.model.clone());
        let usage = out
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();
        let cost = ModelPricing::lookup(&model).map(|p| p.cost(&usage));

        info!(
            model = %model,
            total_tokens = usage.total_tokens,
            latency_ms = started.elapsed().as_millis(),
            "chat completion completed"
        );

        Ok(LlmResponse {
            content,
            model,
            usage,
            cost,
        })
    }
}

/// Truncate a response body for logs and error messages.
fn make_snippet(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= SNIPPET_LEN {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(SNIPPET_LEN).collect();
        format!("{}...", cut)
    }
}

/// Minimal request body for `/v1/chat/completions` (non-streaming).
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl<'a> ChatCompletionRequest<'a> {
    fn from_request(request: &'a LlmRequest) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        Self {
            model: &request.model,
            messages,
            temperature: request.temperature,
            top_p: request.top_p,
            max_tokens: request.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let result = OpenAiClient::new(DEFAULT_OPENAI_URL, "  ", Duration::from_secs(5));
        match result {
            Err(err) => assert!(err.to_string().contains("requires API key")),
            Ok(_) => panic!("Expected error for missing API key"),
        }
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let result = OpenAiClient::new("ftp://example.com", "sk-test", Duration::from_secs(5));
        assert!(result.is_err());
    }

    #[test]
    fn test_chat_url() {
        let client =
            OpenAiClient::new("https://api.openai.com/", "sk-test", Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.url_chat, "https://api.openai.com/v1/chat/completions");
        assert_eq!(client.provider_name(), "openai");
    }

    #[test]
    fn test_request_body_includes_system_first() {
        let request = LlmRequest::new("question", "gpt-4o-mini").with_system("policy");
        let body = serde_json::to_value(ChatCompletionRequest::from_request(&request)).unwrap();

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "policy");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{"message": {"role": "assistant", "content": "Hello"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices.len(), 1);
        assert_eq!(parsed.usage.unwrap().completion_tokens, 5);
    }

    #[test]
    fn test_snippet_truncation() {
        let long = "x".repeat(SNIPPET_LEN + 50);
        let snippet = make_snippet(&long);
        assert!(snippet.ends_with("..."));
        assert_eq!(snippet.len(), SNIPPET_LEN + 3);
    }
}
