//! In-memory vector index.
//!
//! Brute-force cosine similarity over passages embedded at load time.
//! Useful offline and in tests; not meant for large corpora.

use super::{IndexFactory, IndexHit, IndexQuery, QueryInput, VectorIndex};
use crate::embeddings::EmbeddingProvider;
use crate::retriever::RetrieverConfig;
use faqbot_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn default_namespace() -> String {
    "__default__".to_string()
}

/// One passage as stored on disk (one JSON object per line).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl MemoryRecord {
    fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("text".to_string(), Value::String(self.text.clone()));
        if let Some(category) = &self.category {
            fields.insert("category".to_string(), Value::String(category.clone()));
        }
        fields
    }
}

#[derive(Debug)]
struct Entry {
    record: MemoryRecord,
    vector: Vec<f32>,
}

/// In-memory index over embedded passages.
pub struct MemoryIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    entries: Vec<Entry>,
}

impl MemoryIndex {
    /// Embed `records` and build the index.
    pub async fn build(
        embedder: Arc<dyn EmbeddingProvider>,
        records: Vec<MemoryRecord>,
    ) -> AppResult<Self> {
        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed_batch(&texts).await?
        };

        if vectors.len() != records.len() {
            return Err(AppError::Embedding(format!(
                "Embedded {} of {} passages",
                vectors.len(),
                records.len()
            )));
        }

        let entries = records
            .into_iter()
            .zip(vectors)
            .map(|(record, vector)| Entry { record, vector })
            .collect::<Vec<_>>();

        tracing::info!(
            passages = entries.len(),
            embedder = embedder.provider_name(),
            "Built in-memory index"
        );

        Ok(Self { embedder, entries })
    }

    /// Load passages from a JSONL file and build the index.
    pub async fn from_jsonl(path: &Path, embedder: Arc<dyn EmbeddingProvider>) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Retrieval(format!("Failed to read passages {:?}: {}", path, e))
        })?;

        let records = contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str::<MemoryRecord>(line).map_err(|e| {
                    AppError::Retrieval(format!("Invalid passage at {:?}:{}: {}", path, n + 1, e))
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Self::build(embedder, records).await
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Calculate cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Evaluate a metadata filter. Supports `{"f": v}`, `{"f": {"$eq": v}}`,
/// `{"f": {"$ne": v}}` and `{"f": {"$in": [..]}}`; all conditions must hold.
fn matches_filter(fields: &Map<String, Value>, filter: &Value) -> AppResult<bool> {
    let conditions = filter
        .as_object()
        .ok_or_else(|| AppError::Retrieval("Filter must be a JSON object".to_string()))?;

    for (field, condition) in conditions {
        let actual = fields.get(field).unwrap_or(&Value::Null);
        let ok = match condition {
            Value::Object(ops) => {
                let mut all = true;
                for (op, expected) in ops {
                    all &= match op.as_str() {
                        "$eq" => actual == expected,
                        "$ne" => actual != expected,
                        "$in" => expected
                            .as_array()
                            .map(|values| values.contains(actual))
                            .unwrap_or(false),
                        other => {
                            return Err(AppError::Retrieval(format!(
                                "Unsupported filter operator: {}",
                                other
                            )))
                        }
                    };
                }
                all
            }
            expected => actual == expected,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

#[async_trait::async_trait]
impl VectorIndex for MemoryIndex {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn query(&self, query: &IndexQuery) -> AppResult<Vec<IndexHit>> {
        let vector = match &query.input {
            QueryInput::Text(text) => self.embedder.embed(text).await?,
            QueryInput::Vector(vector) => vector.clone(),
        };

        let mut hits = Vec::new();
        for entry in self
            .entries
            .iter()
            .filter(|e| e.record.namespace == query.namespace)
        {
            let fields = entry.record.fields();
            if let Some(filter) = &query.filter {
                if !matches_filter(&fields, filter)? {
                    continue;
                }
            }
            hits.push(IndexHit {
                id: entry.record.id.clone(),
                score: cosine_similarity(&vector, &entry.vector),
                fields,
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(query.top_k);

        tracing::debug!(
            "Memory index returned {} hits (requested top-{})",
            hits.len(),
            query.top_k
        );

        Ok(hits)
    }
}

/// Builds a `MemoryIndex` from an optional JSONL file.
pub struct MemoryIndexFactory {
    path: Option<PathBuf>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl MemoryIndexFactory {
    pub fn new(path: Option<PathBuf>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { path, embedder }
    }
}

#[async_trait::async_trait]
impl IndexFactory for MemoryIndexFactory {
    async fn connect(&self, _config: &RetrieverConfig) -> AppResult<Arc<dyn VectorIndex>> {
        let index = match &self.path {
            Some(path) => MemoryIndex::from_jsonl(path, Arc::clone(&self.embedder)).await?,
            None => MemoryIndex::build(Arc::clone(&self.embedder), Vec::new()).await?,
        };
        Ok(Arc::new(index))
    }
}
