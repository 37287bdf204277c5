//! Embedding providers.
//!
//! Maps query and passage text to vectors for the vector-query mode of the
//! retriever and for the in-memory index.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
pub use providers::{MockProvider, OllamaProvider, OpenAiEmbeddings};
