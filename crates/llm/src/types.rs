//! Provider and pricing types.

use crate::client::LlmUsage;

/// Provider type enum for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    OpenAI,
    Ollama,
}

impl ProviderType {
    /// Parse provider type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    /// Get the canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Ollama => "ollama",
        }
    }
}

/// Per-million-token prices for a hosted model, in USD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

/// Model name prefixes with their prices. More specific prefixes first.
const PRICE_TABLE: &[(&str, ModelPricing)] = &[
    (
        "gpt-4o-mini",
        ModelPricing {
            input_per_million: 0.15,
            output_per_million: 0.60,
        },
    ),
    (
        "gpt-4o",
        ModelPricing {
            input_per_million: 2.50,
            output_per_million: 10.00,
        },
    ),
    (
        "gpt-4.1-mini",
        ModelPricing {
            input_per_million: 0.40,
            output_per_million: 1.60,
        },
    ),
    (
        "gpt-4.1",
        ModelPricing {
            input_per_million: 2.00,
            output_per_million: 8.00,
        },
    ),
    (
        "gpt-3.5-turbo",
        ModelPricing {
            input_per_million: 0.50,
            output_per_million: 1.50,
        },
    ),
];

impl ModelPricing {
    /// Find pricing for a model name, ignoring an optional `openai/` prefix
    /// and dated suffixes. Unknown models are unpriced.
    pub fn lookup(model: &str) -> Option<Self> {
        let name = model.strip_prefix("openai/").unwrap_or(model);
        PRICE_TABLE
            .iter()
            .find(|(prefix, _)| name.starts_with(prefix))
            .map(|(_, pricing)| *pricing)
    }

    /// Cost of one call with the given usage.
    pub fn cost(&self, usage: &LlmUsage) -> f64 {
        (usage.prompt_tokens as f64 * self.input_per_million
            + usage.completion_tokens as f64 * self.output_per_million)
            / 1_000_000.0
    }
}
