//! Pinecone vector index client.
//!
//! The data-plane host is resolved from the index name on first use and
//! cached for the life of the client. Text queries use the index's
//! integrated embedding; vector queries use the classic `/query` route.

use super::{IndexFactory, IndexHit, IndexQuery, QueryInput, RerankOptions, VectorIndex};
use crate::retriever::RetrieverConfig;
use faqbot_core::{AppError, AppResult};
use reqwest::header;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Control-plane endpoint (index metadata, inference).
pub const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";

const API_VERSION: &str = "2025-01";

/// Namespace name used by integrated-embedding routes for the default namespace.
const DEFAULT_NAMESPACE: &str = "__default__";

/// Pinecone index client.
pub struct PineconeIndex {
    client: reqwest::Client,
    control_url: String,
    index_name: String,
    host: OnceCell<String>,
}

impl PineconeIndex {
    /// Create a client for `index_name`. When `host` is given, no
    /// describe-index call is made.
    pub fn new(
        api_key: &str,
        index_name: &str,
        host: Option<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        if api_key.trim().is_empty() {
            return Err(AppError::Config(
                "Pinecone index requires an API key".to_string(),
            ));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            "api-key",
            header::HeaderValue::from_str(api_key)
                .map_err(|e| AppError::Config(format!("Invalid Pinecone API key: {}", e)))?,
        );
        headers.insert(
            "x-pinecone-api-version",
            header::HeaderValue::from_static(API_VERSION),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Retrieval(format!("Failed to create HTTP client: {}", e)))?;

        let cell = match host {
            Some(h) => OnceCell::new_with(Some(normalize_host(&h))),
            None => OnceCell::new(),
        };

        Ok(Self {
            client,
            control_url: CONTROL_PLANE_URL.to_string(),
            index_name: index_name.to_string(),
            host: cell,
        })
    }

    async fn host(&self) -> AppResult<&str> {
        self.host
            .get_or_try_init(|| self.describe_host())
            .await
            .map(String::as_str)
    }

    async fn describe_host(&self) -> AppResult<String> {
        #[derive(Deserialize)]
        struct Description {
            host: String,
        }

        let url = format!("{}/indexes/{}", self.control_url, self.index_name);
        debug!("GET {}", url);

        let description: Description = self.send(self.client.get(&url)).await?;
        info!(index = %self.index_name, host = %description.host, "Resolved Pinecone index host");
        Ok(normalize_host(&description.host))
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> AppResult<T> {
        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(format!("Pinecone request timed out: {}", e))
            } else {
                AppError::Retrieval(format!("Failed to reach Pinecone: {}", e))
            }
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AppError::Retrieval(format!(
                "Pinecone API error ({}): {}",
                status,
                text.trim()
            )));
        }

        resp.json()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to parse Pinecone response: {}", e)))
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// Body for `POST {host}/records/namespaces/{ns}/search`.
fn text_search_body(text: &str, query: &IndexQuery) -> Value {
    let mut inner = json!({
        "inputs": { "text": text },
        "top_k": query.top_k,
    });
    if let Some(filter) = &query.filter {
        inner["filter"] = filter.clone();
    }
    json!({ "query": inner })
}

/// Body for `POST {host}/query`.
fn vector_query_body(vector: &[f32], query: &IndexQuery) -> Value {
    // The classic route names the default namespace ""
    let namespace = if query.namespace == DEFAULT_NAMESPACE {
        ""
    } else {
        query.namespace.as_str()
    };

    let mut body = json!({
        "namespace": namespace,
        "vector": vector,
        "topK": query.top_k,
        "includeMetadata": true,
    });
    if let Some(filter) = &query.filter {
        body["filter"] = filter.clone();
    }
    body
}

fn rerank_body(query_text: &str, hits: &[IndexHit], options: &RerankOptions) -> Value {
    let documents: Vec<&Map<String, Value>> = hits.iter().map(|h| &h.fields).collect();
    json!({
        "model": options.model,
        "query": query_text,
        "documents": documents,
        "top_n": options.top_n,
        "rank_fields": options.rank_fields,
        "return_documents": false,
    })
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: SearchResultBody,
}

#[derive(Debug, Deserialize)]
struct SearchResultBody {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: f32,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    #[serde(default)]
    data: Vec<RerankRow>,
}

#[derive(Debug, Deserialize)]
struct RerankRow {
    index: usize,
    score: f32,
}

/// Apply reranker rows to the original hits. Rows pointing outside the
/// candidate set are dropped.
fn apply_rerank(hits: Vec<IndexHit>, rows: Vec<RerankRow>) -> Vec<IndexHit> {
    let mut slots: Vec<Option<IndexHit>> = hits.into_iter().map(Some).collect();
    rows.into_iter()
        .filter_map(|row| {
            let mut hit = slots.get_mut(row.index)?.take()?;
            hit.score = row.score;
            Some(hit)
        })
        .collect()
}

#[async_trait::async_trait]
impl VectorIndex for PineconeIndex {
    fn backend_name(&self) -> &str {
        "pinecone"
    }

    async fn query(&self, query: &IndexQuery) -> AppResult<Vec<IndexHit>> {
        let started = Instant::now();
        let host = self.host().await?;

        let hits = match &query.input {
            QueryInput::Text(text) => {
                let url = format!("{}/records/namespaces/{}/search", host, query.namespace);
                let resp: SearchResponse = self
                    .send(self.client.post(&url).json(&text_search_body(text, query)))
                    .await?;
                resp.result
                    .hits
                    .into_iter()
                    .map(|h| IndexHit {
                        id: h.id,
                        score: h.score,
                        fields: h.fields,
                    })
                    .collect::<Vec<_>>()
            }
            QueryInput::Vector(vector) => {
                let url = format!("{}/query", host);
                let resp: QueryResponse = self
                    .send(self.client.post(&url).json(&vector_query_body(vector, query)))
                    .await?;
                resp.matches
                    .into_iter()
                    .map(|m| IndexHit {
                        id: m.id,
                        score: m.score,
                        fields: m.metadata.unwrap_or_default(),
                    })
                    .collect()
            }
        };

        debug!(
            index = %self.index_name,
            namespace = %query.namespace,
            hits = hits.len(),
            latency_ms = started.elapsed().as_millis(),
            "Pinecone query completed"
        );

        Ok(hits)
    }

    async fn rerank(
        &self,
        query_text: &str,
        hits: Vec<IndexHit>,
        options: &RerankOptions,
    ) -> AppResult<Vec<IndexHit>> {
        if hits.is_empty() {
            return Ok(hits);
        }

        let url = format!("{}/rerank", self.control_url);
        let resp: RerankResponse = self
            .send(
                self.client
                    .post(&url)
                    .json(&rerank_body(query_text, &hits, options)),
            )
            .await?;

        Ok(apply_rerank(hits, resp.data))
    }
}

/// Builds `PineconeIndex` clients for the configured index name.
pub struct PineconeIndexFactory {
    api_key: String,
    host: Option<String>,
    timeout: Duration,
}

impl PineconeIndexFactory {
    pub fn new(api_key: impl Into<String>, host: Option<String>, timeout: Duration) -> Self {
        Self {
            api_key: api_key.into(),
            host,
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl IndexFactory for PineconeIndexFactory {
    async fn connect(&self, config: &RetrieverConfig) -> AppResult<Arc<dyn VectorIndex>> {
        let index = PineconeIndex::new(
            &self.api_key,
            &config.index_name,
            self.host.clone(),
            self.timeout,
        )?;
        Ok(Arc::new(index))
    }
}
