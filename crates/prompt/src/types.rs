//! Prompt types for the FAQ bot.
//!
//! This module defines the prompt program that drives the answer composer
//! and the prompt it renders for one request.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current prompt program schema version.
pub const PROGRAM_API_VERSION: &str = "1.0";

/// Default user template. Every variable is a plain string.
pub const DEFAULT_TEMPLATE: &str = "{{#if demos}}Worked examples:

{{demos}}

---

{{/if}}{{#if history}}Conversation so far:
{{history}}

{{/if}}Context:
{{context}}

Question: {{question}}";

/// The prompting strategy used to answer one question.
///
/// A program is plain data: it can be saved, loaded, and swapped for an
/// optimized version without touching any network client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptProgram {
    /// Unique program identifier
    pub id: String,

    /// API version for schema evolution
    pub api_version: String,

    /// Who the assistant is
    pub persona: String,

    /// Declared domain the assistant answers about
    pub domain: String,

    /// Scope and grounding policy appended to the persona
    pub instructions: String,

    /// Handlebars user template
    pub template: String,

    /// Few-shot demonstrations
    #[serde(default)]
    pub demos: Vec<Demo>,
}

impl PromptProgram {
    /// Baseline program for a declared domain.
    pub fn default_for(domain: &str) -> Self {
        Self {
            id: "faqbot.answer.default".to_string(),
            api_version: PROGRAM_API_VERSION.to_string(),
            persona: format!("You are a helpful customer support assistant for {}.", domain),
            domain: domain.to_string(),
            instructions: format!(
                "Answer only questions about {domain}; otherwise politely decline and \
                 suggest contacting customer support. Base the answer on the provided \
                 context. If the context does not contain the answer, say so instead of guessing.",
            ),
            template: DEFAULT_TEMPLATE.to_string(),
            demos: Vec::new(),
        }
    }

    /// Copy of this program carrying `demos` instead of its own.
    pub fn with_demos(&self, demos: Vec<Demo>) -> Self {
        Self {
            demos,
            ..self.clone()
        }
    }
}

/// One worked example shown to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demo {
    pub question: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    pub response: String,
}

impl Demo {
    /// A labeled demo: question and reference answer only.
    pub fn labeled(question: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context: None,
            reasoning: None,
            response: response.into(),
        }
    }
}

/// Per-request inputs rendered into the template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptInputs {
    pub question: String,

    /// Retrieved passages joined by blank lines; may be empty
    pub context: String,

    /// Flattened "role: content" transcript; may be empty
    pub history: String,
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message (optional)
    pub system: Option<String>,

    /// User message (required)
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltPromptMetadata {
    /// Source program ID
    pub source_program_id: String,

    /// Number of demos rendered
    pub demo_count: usize,

    /// Whether a non-empty context block was included
    pub context_included: bool,

    /// Template variables that were resolved
    pub resolved_variables: HashMap<String, String>,
}

/// Output fields read back from a completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCompletion {
    pub reasoning: String,
    pub response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_program_states_domain_policy() {
        let program = PromptProgram::default_for("fintech customer support");
        assert_eq!(program.domain, "fintech customer support");
        assert!(program
            .instructions
            .contains("Answer only questions about fintech customer support"));
        assert!(program.instructions.contains("politely decline"));
        assert!(program.demos.is_empty());
    }

    #[test]
    fn test_program_deserialization() {
        let yaml = r#"
id: custom
apiVersion: "1.0"
persona: You are a bank assistant.
domain: banking
instructions: Stay on topic.
template: "Q: {{question}}"
demos:
  - question: How do I reset my PIN?
    response: Use the app settings.
"#;

        let program: PromptProgram = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(program.api_version, "1.0");
        assert_eq!(program.demos.len(), 1);
        assert_eq!(program.demos[0].context, None);
    }

    #[test]
    fn test_with_demos_keeps_policy() {
        let base = PromptProgram::default_for("banking");
        let tuned = base.with_demos(vec![Demo::labeled("q", "a")]);
        assert_eq!(tuned.instructions, base.instructions);
        assert_eq!(tuned.demos.len(), 1);
        assert!(base.demos.is_empty());
    }
}
