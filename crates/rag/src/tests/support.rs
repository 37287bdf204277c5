//! In-process stand-ins for the network capabilities.

use crate::composer::AnswerComposer;
use crate::index::{FixedIndexFactory, IndexHit, IndexQuery, VectorIndex};
use crate::retriever::{Retriever, RetrieverConfig};
use faqbot_core::{AppError, AppResult};
use faqbot_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use faqbot_prompt::PromptProgram;
use serde_json::{json, Map};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Index returning fixed `(id, score, text)` hits in the given order.
pub(crate) struct StaticIndex {
    hits: Vec<(&'static str, f32, &'static str)>,
    pub(crate) queries: AtomicUsize,
}

impl StaticIndex {
    pub(crate) fn new(hits: Vec<(&'static str, f32, &'static str)>) -> Self {
        Self {
            hits,
            queries: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl VectorIndex for StaticIndex {
    fn backend_name(&self) -> &str {
        "static"
    }

    async fn query(&self, query: &IndexQuery) -> AppResult<Vec<IndexHit>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .hits
            .iter()
            .take(query.top_k)
            .map(|(id, score, text)| {
                let mut fields = Map::new();
                fields.insert("text".to_string(), json!(text));
                fields.insert("category".to_string(), json!("faq"));
                IndexHit {
                    id: id.to_string(),
                    score: *score,
                    fields,
                }
            })
            .collect())
    }
}

/// Index whose every query fails.
pub(crate) struct FailingIndex;

#[async_trait::async_trait]
impl VectorIndex for FailingIndex {
    fn backend_name(&self) -> &str {
        "failing"
    }

    async fn query(&self, _query: &IndexQuery) -> AppResult<Vec<IndexHit>> {
        Err(AppError::Retrieval("connection refused".to_string()))
    }
}

enum Script {
    Reply(String),
    Fail,
    Hang,
    Panic,
}

/// Language model with a canned behavior that records what it was sent.
pub(crate) struct ScriptedLlm {
    script: Script,
    cost: Option<f64>,
    pub(crate) calls: AtomicUsize,
    pub(crate) last_request: Mutex<Option<LlmRequest>>,
}

impl ScriptedLlm {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            cost: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub(crate) fn replying(content: impl Into<String>) -> Self {
        Self::with_script(Script::Reply(content.into()))
    }

    pub(crate) fn failing() -> Self {
        Self::with_script(Script::Fail)
    }

    /// Never answers within any reasonable timeout.
    pub(crate) fn hanging() -> Self {
        Self::with_script(Script::Hang)
    }

    pub(crate) fn panicking() -> Self {
        Self::with_script(Script::Panic)
    }

    pub(crate) fn with_cost(mut self, cost: Option<f64>) -> Self {
        self.cost = cost;
        self
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_prompt(&self) -> Option<String> {
        self.last_request
            .lock()
            .unwrap()
            .as_ref()
            .map(|r| r.prompt.clone())
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        match &self.script {
            Script::Reply(content) => Ok(LlmResponse {
                content: content.clone(),
                model: request.model.clone(),
                usage: LlmUsage::new(100, 20),
                cost: self.cost,
            }),
            Script::Fail => Err(AppError::Llm("upstream returned 500".to_string())),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(AppError::Llm("unreachable".to_string()))
            }
            Script::Panic => panic!("model client bug"),
        }
    }
}

/// A completion carrying both output fields.
pub(crate) fn completion(reasoning: &str, response: &str) -> String {
    format!(
        "[[ ## reasoning ## ]]\n{}\n\n[[ ## response ## ]]\n{}",
        reasoning, response
    )
}

pub(crate) fn retriever(index: Arc<dyn VectorIndex>, config: RetrieverConfig) -> Retriever {
    Retriever::new(config, Arc::new(FixedIndexFactory::new(index)))
}

/// Composer over `index` and `llm` with default settings.
pub(crate) fn composer(index: Arc<dyn VectorIndex>, llm: Arc<dyn LlmClient>) -> AnswerComposer {
    AnswerComposer::new(
        retriever(index, RetrieverConfig::default()),
        llm,
        "gpt-4o-mini",
        PromptProgram::default_for("fintech customer support"),
    )
}
