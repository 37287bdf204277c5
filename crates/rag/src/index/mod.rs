//! Vector index abstraction.
//!
//! Defines a trait for provider-agnostic passage search plus the factory
//! the retriever uses to build an index from its configuration.

pub mod memory;
pub mod pinecone;

pub use memory::{MemoryIndex, MemoryIndexFactory, MemoryRecord};
pub use pinecone::{PineconeIndex, PineconeIndexFactory};

use crate::retriever::RetrieverConfig;
use faqbot_core::AppResult;
use serde_json::{Map, Value};
use std::sync::Arc;

/// What to search with.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    /// Raw text, embedded by the index itself
    Text(String),
    /// A precomputed query embedding
    Vector(Vec<f32>),
}

/// One search request against an index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    pub namespace: String,
    pub input: QueryInput,
    pub top_k: usize,
    /// Backend metadata filter, e.g. `{"category": {"$eq": "cards"}}`
    pub filter: Option<Value>,
}

/// One candidate returned by an index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub id: String,
    pub score: f32,
    /// Stored metadata; carries at least `text` and usually `category`
    pub fields: Map<String, Value>,
}

impl IndexHit {
    pub fn text(&self) -> Option<&str> {
        self.fields.get("text").and_then(Value::as_str)
    }

    pub fn category(&self) -> Option<&str> {
        self.fields
            .get("category")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
    }
}

/// Secondary reranking pass settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankOptions {
    pub model: String,
    pub rank_fields: Vec<String>,
    pub top_n: usize,
}

/// Trait for vector index backends.
///
/// Implementations return hits ordered by descending relevance.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name for logs ("pinecone", "memory").
    fn backend_name(&self) -> &str;

    /// Search for up to `query.top_k` candidates.
    async fn query(&self, query: &IndexQuery) -> AppResult<Vec<IndexHit>>;

    /// Reorder `hits` for `query_text`, replacing scores with reranker scores.
    ///
    /// Backends without a reranker keep the order and scores as they are.
    async fn rerank(
        &self,
        _query_text: &str,
        hits: Vec<IndexHit>,
        options: &RerankOptions,
    ) -> AppResult<Vec<IndexHit>> {
        Ok(hits.into_iter().take(options.top_n).collect())
    }
}

/// Builds an index client from retriever configuration.
#[async_trait::async_trait]
pub trait IndexFactory: Send + Sync {
    async fn connect(&self, config: &RetrieverConfig) -> AppResult<Arc<dyn VectorIndex>>;
}

/// Factory handing out one prebuilt index regardless of configuration.
pub struct FixedIndexFactory {
    index: Arc<dyn VectorIndex>,
}

impl FixedIndexFactory {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }
}

#[async_trait::async_trait]
impl IndexFactory for FixedIndexFactory {
    async fn connect(&self, _config: &RetrieverConfig) -> AppResult<Arc<dyn VectorIndex>> {
        Ok(Arc::clone(&self.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(fields: Value) -> IndexHit {
        IndexHit {
            id: "faq-1".to_string(),
            score: 0.8,
            fields: fields.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_hit_field_accessors() {
        let h = hit(json!({"text": "Open 9-5", "category": "hours"}));
        assert_eq!(h.text(), Some("Open 9-5"));
        assert_eq!(h.category(), Some("hours"));

        let h = hit(json!({"text": 42, "category": ""}));
        assert_eq!(h.text(), None);
        assert_eq!(h.category(), None);
    }

    struct Plain;

    #[async_trait::async_trait]
    impl VectorIndex for Plain {
        fn backend_name(&self) -> &str {
            "plain"
        }

        async fn query(&self, _query: &IndexQuery) -> AppResult<Vec<IndexHit>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_default_rerank_keeps_order_and_truncates() {
        let hits = vec![
            hit(json!({"text": "a"})),
            hit(json!({"text": "b"})),
            hit(json!({"text": "c"})),
        ];
        let options = RerankOptions {
            model: "none".to_string(),
            rank_fields: vec!["text".to_string()],
            top_n: 2,
        };
        let out = Plain.rerank("q", hits, &options).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text(), Some("a"));
    }
}
