//! Request and result types for the answer pipeline.

use serde::{Deserialize, Serialize};

/// One retrieved passage.
///
/// Every `SearchResult` handed to the composer has already passed the
/// retriever's threshold check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Identifier from the vector index
    pub id: String,

    /// Relevance score; higher is more relevant, range depends on the index
    pub score: f32,

    /// Passage body used as generation context
    pub text: String,

    /// Optional classification label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Speaker of one conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Outcome class of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RagStatus {
    Success,
    NoContext,
    Error,
}

impl RagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RagStatus::Success => "success",
            RagStatus::NoContext => "no_context",
            RagStatus::Error => "error",
        }
    }
}

/// Final, always well-formed result of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagResult {
    /// Answer shown to the caller
    pub response: String,

    /// The model's stated justification; may be empty
    pub reasoning: String,

    /// Passages actually used, in retrieval order
    pub contexts: Vec<SearchResult>,

    /// Mean of `contexts[*].score`; 0.0 when there are none
    pub confidence: f32,

    pub status: RagStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RagStatus::NoContext).unwrap(),
            "\"no_context\""
        );
        assert_eq!(RagStatus::Success.as_str(), "success");
    }

    #[test]
    fn test_chat_message_json() {
        let messages: Vec<ChatMessage> = serde_json::from_str(
            r#"[{"role":"user","content":"hi"},{"role":"assistant","content":"hello"}]"#,
        )
        .unwrap();
        assert_eq!(messages[0], ChatMessage::user("hi"));
        assert_eq!(messages[1].role.to_string(), "assistant");
    }

    #[test]
    fn test_unknown_role_rejected() {
        let parsed = serde_json::from_str::<ChatMessage>(r#"{"role":"bot","content":"x"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_search_result_category_optional() {
        let result: SearchResult =
            serde_json::from_str(r#"{"id":"faq-1","score":0.9,"text":"Open 9-5"}"#).unwrap();
        assert_eq!(result.category, None);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("category").is_none());
    }
}
