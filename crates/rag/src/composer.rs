//! Answer composition.
//!
//! Retrieves passages, renders them with the conversation history into
//! the prompt program, and asks the language model for a response plus
//! its reasoning. Confidence is left to the aggregator.

use crate::retriever::{bounded, Retriever, DEFAULT_CALL_TIMEOUT};
use crate::types::{ChatMessage, SearchResult};
use faqbot_core::config::AnswerSettings;
use faqbot_core::{AppError, AppResult};
use faqbot_llm::{LlmClient, LlmRequest};
use faqbot_prompt::{build_prompt, parse_completion, PromptInputs, PromptProgram};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Order of the rendered history transcript.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HistoryOrder {
    #[default]
    Chronological,
    MostRecentFirst,
}

impl HistoryOrder {
    pub fn parse(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "chronological" => Ok(Self::Chronological),
            "most_recent_first" => Ok(Self::MostRecentFirst),
            other => Err(AppError::Config(format!("Unknown history order: {}", other))),
        }
    }
}

/// What to do when no passage clears the threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyContextPolicy {
    /// Call the model with an empty context block
    #[default]
    AlwaysGenerate,
    /// Skip the model call
    ShortCircuit,
}

impl EmptyContextPolicy {
    pub fn parse(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "always_generate" => Ok(Self::AlwaysGenerate),
            "short_circuit" => Ok(Self::ShortCircuit),
            other => Err(AppError::Config(format!(
                "Unknown empty context policy: {}",
                other
            ))),
        }
    }
}

/// Composition knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposerPolicy {
    /// Most recent turns kept; 0 drops history entirely
    pub history_limit: usize,
    pub history_order: HistoryOrder,
    pub empty_context: EmptyContextPolicy,
    /// Character budget for the context block
    pub max_context_length: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ComposerPolicy {
    fn default() -> Self {
        Self {
            history_limit: 3,
            history_order: HistoryOrder::default(),
            empty_context: EmptyContextPolicy::default(),
            max_context_length: 4000,
            temperature: 0.3,
            max_tokens: 1000,
        }
    }
}

impl ComposerPolicy {
    pub fn from_settings(settings: &AnswerSettings) -> AppResult<Self> {
        Ok(Self {
            history_limit: settings.history_limit,
            history_order: HistoryOrder::parse(&settings.history_order)?,
            empty_context: EmptyContextPolicy::parse(&settings.empty_context)?,
            max_context_length: settings.max_context_length,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }
}

/// Raw result of one composition, before aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposerOutcome {
    pub response: String,
    pub reasoning: String,
    /// Passages placed in the prompt
    pub contexts: Vec<SearchResult>,
}

/// Render the last `limit` turns as a "role: content" transcript.
pub fn render_history(history: &[ChatMessage], limit: usize, order: HistoryOrder) -> String {
    let start = history.len().saturating_sub(limit);
    let recent = &history[start..];

    let lines = recent
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content.trim()));

    match order {
        HistoryOrder::Chronological => lines.collect::<Vec<_>>().join("\n"),
        HistoryOrder::MostRecentFirst => lines.rev().collect::<Vec<_>>().join("\n"),
    }
}

/// Join passage texts with blank lines, stopping at a passage boundary once
/// `max_len` characters would be exceeded. The first passage is always
/// kept. Returns the block and the number of passages used.
pub fn build_context(contexts: &[SearchResult], max_len: usize) -> (String, usize) {
    let mut block = String::new();
    let mut used = 0;

    for passage in contexts {
        let text = passage.text.trim();
        let added = if used == 0 {
            text.chars().count()
        } else {
            text.chars().count() + 2
        };

        if used > 0 && block.chars().count() + added > max_len {
            debug!(
                kept = used,
                dropped = contexts.len() - used,
                "Context block truncated"
            );
            break;
        }

        if used > 0 {
            block.push_str("\n\n");
        }
        block.push_str(text);
        used += 1;
    }

    (block, used)
}

/// Grounded answer generator.
#[derive(Clone)]
pub struct AnswerComposer {
    retriever: Retriever,
    llm: Arc<dyn LlmClient>,
    model: String,
    program: PromptProgram,
    policy: ComposerPolicy,
    timeout: Duration,
}

impl AnswerComposer {
    pub fn new(
        retriever: Retriever,
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        program: PromptProgram,
    ) -> Self {
        Self {
            retriever,
            llm,
            model: model.into(),
            program,
            policy: ComposerPolicy::default(),
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: ComposerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Budget for the model call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Copy of this composer using `program`.
    pub fn with_program(&self, program: PromptProgram) -> Self {
        Self {
            program,
            ..self.clone()
        }
    }

    /// Copy of this composer calling `llm`.
    pub fn with_llm(&self, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            ..self.clone()
        }
    }

    /// Copy of this composer using `retriever`.
    pub fn with_retriever(&self, retriever: Retriever) -> Self {
        Self {
            retriever,
            ..self.clone()
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn program(&self) -> &PromptProgram {
        &self.program
    }

    pub fn policy(&self) -> &ComposerPolicy {
        &self.policy
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    /// Answer `question`.
    ///
    /// Retrieval problems surface as an empty context list. Prompt or
    /// language model failures, including timeouts, are returned as `Err`.
    pub async fn answer(
        &self,
        question: &str,
        history: Option<&[ChatMessage]>,
    ) -> AppResult<ComposerOutcome> {
        let retrieved = self.retriever.retrieve(question, None).await;
        let (context, used) = build_context(&retrieved, self.policy.max_context_length);
        let mut contexts = retrieved;
        contexts.truncate(used);

        if contexts.is_empty() && self.policy.empty_context == EmptyContextPolicy::ShortCircuit {
            info!("No context above threshold; skipping generation");
            return Ok(ComposerOutcome {
                response: String::new(),
                reasoning: String::new(),
                contexts,
            });
        }

        let history = history
            .map(|h| render_history(h, self.policy.history_limit, self.policy.history_order))
            .unwrap_or_default();

        let built = build_prompt(
            &self.program,
            &PromptInputs {
                question: question.to_string(),
                context,
                history,
            },
        )?;

        let mut request = LlmRequest::new(built.user, &self.model)
            .with_temperature(self.policy.temperature)
            .with_max_tokens(self.policy.max_tokens);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        let completion = bounded(self.timeout, "generation", self.llm.complete(&request)).await?;
        let parsed = parse_completion(&completion.content);

        info!(
            model = %completion.model,
            contexts = contexts.len(),
            demos = built.metadata.demo_count,
            total_tokens = completion.usage.total_tokens,
            "Composed answer"
        );

        Ok(ComposerOutcome {
            response: parsed.response,
            reasoning: parsed.reasoning,
            contexts,
        })
    }
}

impl std::fmt::Debug for AnswerComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerComposer")
            .field("retriever", &self.retriever)
            .field("provider", &self.llm.provider_name())
            .field("model", &self.model)
            .field("program", &self.program.id)
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn passage(id: &str, text: &str) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            score: 0.9,
            text: text.to_string(),
            category: None,
        }
    }

    fn turns(n: usize) -> Vec<ChatMessage> {
        (1..=n)
            .map(|i| ChatMessage {
                role: if i % 2 == 1 { Role::User } else { Role::Assistant },
                content: format!("turn {}", i),
            })
            .collect()
    }

    #[test]
    fn test_history_keeps_last_turns_in_order() {
        let rendered = render_history(&turns(5), 3, HistoryOrder::Chronological);
        assert_eq!(rendered, "user: turn 3\nassistant: turn 4\nuser: turn 5");
    }

    #[test]
    fn test_history_most_recent_first() {
        let rendered = render_history(&turns(5), 2, HistoryOrder::MostRecentFirst);
        assert_eq!(rendered, "user: turn 5\nassistant: turn 4");
    }

    #[test]
    fn test_history_shorter_than_limit_and_zero_limit() {
        assert_eq!(
            render_history(&turns(1), 3, HistoryOrder::Chronological),
            "user: turn 1"
        );
        assert_eq!(render_history(&turns(4), 0, HistoryOrder::Chronological), "");
    }

    #[test]
    fn test_context_joined_with_blank_lines() {
        let (block, used) = build_context(&[passage("a", "First."), passage("b", " Second. ")], 100);
        assert_eq!(block, "First.\n\nSecond.");
        assert_eq!(used, 2);
    }

    #[test]
    fn test_context_truncated_at_passage_boundary() {
        let passages = [
            passage("a", &"x".repeat(30)),
            passage("b", &"y".repeat(30)),
            passage("c", "z"),
        ];
        let (block, used) = build_context(&passages, 50);
        assert_eq!(used, 1);
        assert_eq!(block.len(), 30);
    }

    #[test]
    fn test_context_keeps_oversized_first_passage() {
        let (block, used) = build_context(&[passage("a", &"x".repeat(80))], 10);
        assert_eq!(used, 1);
        assert_eq!(block.len(), 80);
    }

    #[test]
    fn test_policy_parsing() {
        let settings = AnswerSettings {
            history_order: "most_recent_first".to_string(),
            empty_context: "short_circuit".to_string(),
            ..AnswerSettings::default()
        };
        let policy = ComposerPolicy::from_settings(&settings).unwrap();
        assert_eq!(policy.history_order, HistoryOrder::MostRecentFirst);
        assert_eq!(policy.empty_context, EmptyContextPolicy::ShortCircuit);
        assert!(HistoryOrder::parse("random").is_err());
        assert!(EmptyContextPolicy::parse("never").is_err());
    }
}
