//! Retrieval-augmented answering for the FAQ bot.
//!
//! A request flows retriever → composer → aggregator:
//! - [`Retriever`] turns a question into thresholded passages
//! - [`AnswerComposer`] grounds a language model answer in those passages
//! - [`aggregator::finalize`] packages the final [`RagResult`]
//!
//! [`RagService`] wires the three together from [`faqbot_core::AppConfig`].
//! The [`optimize`] module is the offline harness that tunes the composer's
//! few-shot demos.

pub mod aggregator;
pub mod composer;
pub mod embeddings;
pub mod index;
pub mod optimize;
pub mod retriever;
pub mod service;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use composer::{
    AnswerComposer, ComposerOutcome, ComposerPolicy, EmptyContextPolicy, HistoryOrder,
};
pub use retriever::{QueryMode, RerankConfig, Retriever, RetrieverConfig, ThresholdMode};
pub use service::{build_composer, build_llm, build_retriever, RagService};
pub use types::{ChatMessage, RagResult, RagStatus, Role, SearchResult};
