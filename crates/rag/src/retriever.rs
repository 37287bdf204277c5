//! Thresholded passage retrieval.
//!
//! The retriever owns only a lightweight [`RetrieverConfig`] and a factory.
//! Index clients are built on first use and never copied, compared or
//! serialized; a clone starts unconnected and reconnects on demand.

use crate::embeddings::EmbeddingProvider;
use crate::index::{IndexFactory, IndexQuery, QueryInput, RerankOptions, VectorIndex};
use crate::types::SearchResult;
use faqbot_core::{AppConfig, AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Default per-call budget when none is configured.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// How a score is compared with the similarity threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// Keep `score >= threshold`
    #[default]
    Inclusive,
    /// Keep `score > threshold`
    Exclusive,
}

impl ThresholdMode {
    pub fn parse(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "inclusive" => Ok(Self::Inclusive),
            "exclusive" => Ok(Self::Exclusive),
            other => Err(AppError::Config(format!(
                "Unknown threshold mode: {}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inclusive => "inclusive",
            Self::Exclusive => "exclusive",
        }
    }

    pub fn admits(&self, score: f32, threshold: f32) -> bool {
        match self {
            Self::Inclusive => score >= threshold,
            Self::Exclusive => score > threshold,
        }
    }
}

/// How the query reaches the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Send raw text; the index embeds it
    #[default]
    Text,
    /// Embed locally and send the vector
    Vector,
}

impl QueryMode {
    pub fn parse(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "vector" => Ok(Self::Vector),
            other => Err(AppError::Config(format!("Unknown query mode: {}", other))),
        }
    }
}

/// Secondary reranking pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankConfig {
    pub model: String,
    pub rank_fields: Vec<String>,
    /// Candidates kept after reranking; defaults to `k`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,
}

/// Retriever tuning. This record is the whole persisted retriever state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieverConfig {
    pub index_name: String,
    pub namespace: String,
    pub k: usize,
    pub threshold: f32,
    #[serde(default)]
    pub threshold_mode: ThresholdMode,
    #[serde(default)]
    pub query_mode: QueryMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank: Option<RerankConfig>,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            index_name: "fintech-faqs".to_string(),
            namespace: "__default__".to_string(),
            k: 3,
            threshold: 0.7,
            threshold_mode: ThresholdMode::default(),
            query_mode: QueryMode::default(),
            rerank: None,
        }
    }
}

impl RetrieverConfig {
    /// Build from application settings.
    pub fn from_app_config(config: &AppConfig) -> AppResult<Self> {
        let retrieval = &config.retrieval;
        Ok(Self {
            index_name: config.index.name.clone(),
            namespace: config.index.namespace.clone(),
            k: retrieval.top_k,
            threshold: retrieval.similarity_threshold,
            threshold_mode: ThresholdMode::parse(&retrieval.threshold_mode)?,
            query_mode: QueryMode::parse(&retrieval.query_mode)?,
            rerank: retrieval.rerank_model.as_ref().map(|model| RerankConfig {
                model: model.clone(),
                rank_fields: retrieval.rank_fields.clone(),
                top_n: None,
            }),
        })
    }

    /// Whether a candidate with `score` clears the threshold.
    pub fn admits(&self, score: f32) -> bool {
        self.threshold_mode.admits(score, self.threshold)
    }

    /// Serialize the lightweight state.
    pub fn dump_state(&self) -> AppResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild from state produced by [`RetrieverConfig::dump_state`].
    pub fn from_state(state: Value) -> AppResult<Self> {
        Ok(serde_json::from_value(state)?)
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Turns a query into thresholded, ranked passages.
pub struct Retriever {
    config: RetrieverConfig,
    factory: Arc<dyn IndexFactory>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    timeout: Duration,
    index: OnceCell<Arc<dyn VectorIndex>>,
}

impl Retriever {
    pub fn new(config: RetrieverConfig, factory: Arc<dyn IndexFactory>) -> Self {
        Self {
            config,
            factory,
            embedder: None,
            timeout: DEFAULT_CALL_TIMEOUT,
            index: OnceCell::new(),
        }
    }

    /// Embedding provider used in [`QueryMode::Vector`].
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Budget applied to each network call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// A new, unconnected retriever sharing this one's factory and embedder.
    pub fn with_config(&self, config: RetrieverConfig) -> Self {
        Self {
            config,
            factory: Arc::clone(&self.factory),
            embedder: self.embedder.clone(),
            timeout: self.timeout,
            index: OnceCell::new(),
        }
    }

    /// Serialize the lightweight state; clients are never included.
    pub fn dump_state(&self) -> AppResult<Value> {
        self.config.dump_state()
    }

    /// Rebuild a retriever from dumped state. Clients reconnect lazily.
    pub fn load_state(&self, state: Value) -> AppResult<Self> {
        Ok(self.with_config(RetrieverConfig::from_state(state)?))
    }

    /// Whether the index client has been built yet.
    pub fn is_connected(&self) -> bool {
        self.index.initialized()
    }

    /// Retrieve passages for `query`, `k` overriding the configured count.
    ///
    /// Never fails: embedding or index errors and timeouts are logged and
    /// yield an empty list.
    pub async fn retrieve(&self, query: &str, k: Option<usize>) -> Vec<SearchResult> {
        self.retrieve_filtered(query, k, None).await
    }

    /// Like [`Retriever::retrieve`], passing a metadata filter to the index.
    pub async fn retrieve_filtered(
        &self,
        query: &str,
        k: Option<usize>,
        filter: Option<Value>,
    ) -> Vec<SearchResult> {
        if query.trim().is_empty() {
            debug!("Empty query; skipping retrieval");
            return Vec::new();
        }

        match self.try_retrieve(query, k, filter).await {
            Ok(results) => results,
            Err(e) => {
                warn!(
                    index = %self.config.index_name,
                    namespace = %self.config.namespace,
                    error = %e,
                    "Retrieval failed; continuing without context"
                );
                Vec::new()
            }
        }
    }

    async fn try_retrieve(
        &self,
        query: &str,
        k: Option<usize>,
        filter: Option<Value>,
    ) -> AppResult<Vec<SearchResult>> {
        let k = k.unwrap_or(self.config.k).max(1);
        let index = self.index().await?;

        let input = match self.config.query_mode {
            QueryMode::Text => QueryInput::Text(query.to_string()),
            QueryMode::Vector => {
                let embedder = self.embedder.as_ref().ok_or_else(|| {
                    AppError::Retrieval(
                        "Vector query mode requires an embedding provider".to_string(),
                    )
                })?;
                QueryInput::Vector(bounded(self.timeout, "embedding", embedder.embed(query)).await?)
            }
        };

        let request = IndexQuery {
            namespace: self.config.namespace.clone(),
            input,
            top_k: k,
            filter,
        };

        let mut hits = bounded(self.timeout, "index query", index.query(&request)).await?;
        let candidates = hits.len();

        if let Some(rerank) = &self.config.rerank {
            let options = RerankOptions {
                model: rerank.model.clone(),
                rank_fields: rerank.rank_fields.clone(),
                top_n: rerank.top_n.unwrap_or(k),
            };
            hits = bounded(self.timeout, "rerank", index.rerank(query, hits, &options)).await?;
        }

        let results: Vec<SearchResult> = hits
            .into_iter()
            .filter(|hit| self.config.admits(hit.score))
            .map(|hit| SearchResult {
                text: hit.text().unwrap_or_default().to_string(),
                category: hit.category().map(str::to_string),
                id: hit.id,
                score: hit.score,
            })
            .collect();

        info!(
            backend = index.backend_name(),
            k,
            candidates,
            kept = results.len(),
            threshold = self.config.threshold,
            mode = self.config.threshold_mode.as_str(),
            "Retrieved passages"
        );

        Ok(results)
    }

    async fn index(&self) -> AppResult<&Arc<dyn VectorIndex>> {
        self.index
            .get_or_try_init(|| {
                debug!(index = %self.config.index_name, "Connecting vector index");
                bounded(self.timeout, "index connect", self.factory.connect(&self.config))
            })
            .await
    }
}

/// Run `fut`, mapping an elapsed budget to `AppError::Timeout`.
pub(crate) async fn bounded<T>(
    timeout: Duration,
    what: &str,
    fut: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(format!(
            "{} exceeded {}ms",
            what,
            timeout.as_millis()
        ))),
    }
}

impl Clone for Retriever {
    fn clone(&self) -> Self {
        self.with_config(self.config.clone())
    }
}

impl PartialEq for Retriever {
    fn eq(&self, other: &Self) -> bool {
        self.config == other.config
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Serialize for Retriever {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.config.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{FixedIndexFactory, IndexHit};
    use serde_json::{json, Map};

    struct Scored(Vec<(&'static str, f32)>);

    #[async_trait::async_trait]
    impl VectorIndex for Scored {
        fn backend_name(&self) -> &str {
            "scored"
        }

        async fn query(&self, query: &IndexQuery) -> AppResult<Vec<IndexHit>> {
            Ok(self
                .0
                .iter()
                .take(query.top_k)
                .map(|(id, score)| {
                    let mut fields = Map::new();
                    fields.insert("text".to_string(), json!(format!("passage {}", id)));
                    IndexHit {
                        id: id.to_string(),
                        score: *score,
                        fields,
                    }
                })
                .collect())
        }
    }

    /// Reverses the candidates and replaces their scores.
    struct Reversing {
        inner: Scored,
        rescored: Vec<f32>,
    }

    #[async_trait::async_trait]
    impl VectorIndex for Reversing {
        fn backend_name(&self) -> &str {
            "reversing"
        }

        async fn query(&self, query: &IndexQuery) -> AppResult<Vec<IndexHit>> {
            self.inner.query(query).await
        }

        async fn rerank(
            &self,
            _query_text: &str,
            hits: Vec<IndexHit>,
            options: &RerankOptions,
        ) -> AppResult<Vec<IndexHit>> {
            Ok(hits
                .into_iter()
                .rev()
                .zip(self.rescored.iter())
                .map(|(hit, score)| IndexHit {
                    score: *score,
                    ..hit
                })
                .take(options.top_n)
                .collect())
        }
    }

    #[derive(Debug)]
    struct BrokenEmbedder;

    #[async_trait::async_trait]
    impl EmbeddingProvider for BrokenEmbedder {
        fn provider_name(&self) -> &str {
            "broken"
        }

        fn model_name(&self) -> &str {
            "none"
        }

        fn dimensions(&self) -> usize {
            4
        }

        async fn embed_batch(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Err(AppError::Embedding("connection refused".to_string()))
        }
    }

    fn retriever(hits: Vec<(&'static str, f32)>, config: RetrieverConfig) -> Retriever {
        Retriever::new(config, Arc::new(FixedIndexFactory::new(Arc::new(Scored(hits)))))
    }

    fn rerank_config() -> RetrieverConfig {
        RetrieverConfig {
            rerank: Some(RerankConfig {
                model: "test-reranker".to_string(),
                rank_fields: vec!["text".to_string()],
                top_n: None,
            }),
            ..RetrieverConfig::default()
        }
    }

    #[test]
    fn test_threshold_modes() {
        assert!(ThresholdMode::Inclusive.admits(0.7, 0.7));
        assert!(!ThresholdMode::Exclusive.admits(0.7, 0.7));
        assert!(ThresholdMode::Exclusive.admits(0.71, 0.7));
        assert!(ThresholdMode::parse("sideways").is_err());
        assert_eq!(QueryMode::parse("Vector").unwrap(), QueryMode::Vector);
    }

    #[tokio::test]
    async fn test_order_preserved_and_below_threshold_dropped() {
        let r = retriever(
            vec![("a", 0.95), ("b", 0.4), ("c", 0.8)],
            RetrieverConfig::default(),
        );
        let results = r.retrieve("hours", None).await;
        let ids: Vec<_> = results.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(results[0].text, "passage a");
        assert!(r.is_connected());
    }

    #[tokio::test]
    async fn test_k_override() {
        let r = retriever(vec![("a", 0.9), ("b", 0.9)], RetrieverConfig::default());
        assert_eq!(r.retrieve("q", Some(1)).await.len(), 1);
    }

    #[tokio::test]
    async fn test_vector_mode_without_embedder_degrades_to_empty() {
        let config = RetrieverConfig {
            query_mode: QueryMode::Vector,
            ..RetrieverConfig::default()
        };
        let r = retriever(vec![("a", 0.9)], config);
        assert!(r.retrieve("q", None).await.is_empty());
    }

    #[tokio::test]
    async fn test_vector_mode_embedding_failure_degrades_to_empty() {
        let config = RetrieverConfig {
            query_mode: QueryMode::Vector,
            ..RetrieverConfig::default()
        };
        let r = retriever(vec![("a", 0.9)], config).with_embedder(Arc::new(BrokenEmbedder));
        assert!(r.retrieve("q", None).await.is_empty());
        assert!(r.is_connected());
    }

    #[tokio::test]
    async fn test_rerank_order_and_scores_drive_filtering() {
        let index = Reversing {
            inner: Scored(vec![("a", 0.95), ("b", 0.9), ("c", 0.2)]),
            rescored: vec![0.99, 0.8, 0.1],
        };
        let r = Retriever::new(
            rerank_config(),
            Arc::new(FixedIndexFactory::new(Arc::new(index))),
        );

        let results = r.retrieve("hours", None).await;
        let ranked: Vec<_> = results.iter().map(|s| (s.id.as_str(), s.score)).collect();
        // "c" was below threshold before reranking; "a" falls below after
        assert_eq!(ranked, vec![("c", 0.99), ("b", 0.8)]);
        assert_eq!(results[0].text, "passage c");
    }

    #[tokio::test]
    async fn test_rerank_respects_k_override() {
        let index = Reversing {
            inner: Scored(vec![("a", 0.9), ("b", 0.9), ("c", 0.9)]),
            rescored: vec![0.9, 0.9, 0.9],
        };
        let r = Retriever::new(
            rerank_config(),
            Arc::new(FixedIndexFactory::new(Arc::new(index))),
        );

        let ids: Vec<_> = r
            .retrieve("q", Some(2))
            .await
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn test_clone_is_unconnected_and_equal() {
        let r = retriever(vec![("a", 0.9)], RetrieverConfig::default());
        r.retrieve("q", None).await;
        let copy = r.clone();
        assert!(!copy.is_connected());
        assert_eq!(copy, r);
        assert_eq!(
            serde_json::to_value(&copy).unwrap(),
            r.dump_state().unwrap()
        );
    }

    #[test]
    fn test_state_excludes_clients() {
        let state = RetrieverConfig::default().dump_state().unwrap();
        let mut keys: Vec<_> = state.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["indexName", "k", "namespace", "queryMode", "threshold", "thresholdMode"]
        );
        assert_eq!(state["thresholdMode"], "inclusive");
    }

    #[test]
    fn test_from_app_config() {
        let mut app = AppConfig::default();
        app.retrieval.threshold_mode = "exclusive".to_string();
        app.retrieval.rerank_model = Some("pinecone-rerank-v0".to_string());

        let config = RetrieverConfig::from_app_config(&app).unwrap();
        assert_eq!(config.threshold_mode, ThresholdMode::Exclusive);
        assert_eq!(config.k, 3);
        assert_eq!(config.rerank.unwrap().rank_fields, vec!["text".to_string()]);
    }

    #[tokio::test]
    async fn test_bounded_maps_elapsed_to_timeout() {
        let result: AppResult<()> = bounded(Duration::from_millis(5), "slow", async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        assert!(result.unwrap_err().is_timeout());
    }
}
