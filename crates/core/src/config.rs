//! Configuration management for the FAQ bot.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config file (`faqbot.yaml`, or the path in `FAQBOT_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! Only lightweight scalar settings live here. Network clients are built
//! from these values by the crates that own them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "faqbot.yaml";

const KNOWN_PROVIDERS: [&str; 2] = ["openai", "ollama"];
const KNOWN_EMBEDDING_PROVIDERS: [&str; 3] = ["mock", "ollama", "openai"];
const KNOWN_BACKENDS: [&str; 2] = ["pinecone", "memory"];
const THRESHOLD_MODES: [&str; 2] = ["inclusive", "exclusive"];
const QUERY_MODES: [&str; 2] = ["text", "vector"];
const HISTORY_ORDERS: [&str; 2] = ["chronological", "most_recent_first"];
const EMPTY_CONTEXT_POLICIES: [&str; 2] = ["always_generate", "short_circuit"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Language model provider ("openai", "ollama")
    pub provider: String,

    /// Language model identifier
    pub model: String,

    /// Custom language model endpoint
    pub llm_endpoint: Option<String>,

    /// Environment variable holding the language model API key
    pub api_key_env: String,

    /// Explicit API key (from `FAQBOT_API_KEY`)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Embedding provider settings
    pub embedding: EmbeddingSettings,

    /// Vector index settings
    pub index: IndexSettings,

    /// Retriever tuning
    pub retrieval: RetrievalSettings,

    /// Answer composition policy
    pub answer: AnswerSettings,

    /// Saved optimized module loaded before serving
    pub optimized_path: Option<PathBuf>,

    /// Timeout applied to each network call, in seconds
    pub request_timeout_secs: u64,

    /// Log level override
    pub log_level: Option<String>,

    /// Log line format ("text" or "json")
    pub log_format: String,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Embedding provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// Provider name: "mock", "ollama", "openai"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Custom endpoint for the embedding API
    pub endpoint: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            endpoint: None,
        }
    }
}

/// Vector index settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IndexSettings {
    /// Backend: "pinecone" or "memory"
    pub backend: String,

    /// Index name
    pub name: String,

    /// Namespace searched within the index
    pub namespace: String,

    /// Environment variable holding the index API key
    pub api_key_env: String,

    /// Data-plane host; resolved from the index name when absent
    pub host: Option<String>,

    /// JSONL passages for the memory backend
    pub memory_path: Option<PathBuf>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: "pinecone".to_string(),
            name: "fintech-faqs".to_string(),
            namespace: "__default__".to_string(),
            api_key_env: "PINECONE_API_KEY".to_string(),
            host: None,
            memory_path: None,
        }
    }
}

/// Retriever tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalSettings {
    /// Number of candidates requested from the index
    pub top_k: usize,

    /// Minimum similarity score kept
    pub similarity_threshold: f32,

    /// "inclusive" (score >= threshold) or "exclusive" (score > threshold)
    pub threshold_mode: String,

    /// "text" (index embeds the query) or "vector" (we embed it)
    pub query_mode: String,

    /// Reranker model; reranking is off when absent
    pub rerank_model: Option<String>,

    /// Passage fields the reranker reads
    pub rank_fields: Vec<String>,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            similarity_threshold: 0.7,
            threshold_mode: "inclusive".to_string(),
            query_mode: "text".to_string(),
            rerank_model: None,
            rank_fields: vec!["text".to_string()],
        }
    }
}

/// Answer composition policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnswerSettings {
    /// Declared domain the assistant is allowed to answer about
    pub domain: String,

    /// Number of most recent history turns kept in the prompt
    pub history_limit: usize,

    /// "chronological" or "most_recent_first"
    pub history_order: String,

    /// "always_generate" or "short_circuit"
    pub empty_context: String,

    /// Character budget for the context block
    pub max_context_length: usize,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            domain: "fintech customer support".to_string(),
            history_limit: 3,
            history_order: "chronological".to_string(),
            empty_context: "always_generate".to_string(),
            max_context_length: 4000,
            temperature: 0.3,
            max_tokens: 1000,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    llm: Option<LlmSection>,
    embedding: Option<EmbeddingSettings>,
    index: Option<IndexSettings>,
    retrieval: Option<RetrievalSettings>,
    answer: Option<AnswerSettings>,
    optimized_path: Option<String>,
    request_timeout_secs: Option<u64>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlmSection {
    provider: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    format: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            llm_endpoint: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            embedding: EmbeddingSettings::default(),
            index: IndexSettings::default(),
            retrieval: RetrievalSettings::default(),
            answer: AnswerSettings::default(),
            optimized_path: None,
            request_timeout_secs: 30,
            log_level: None,
            log_format: "text".to_string(),
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the config file, environment variables and defaults.
    ///
    /// Environment variables:
    /// - `FAQBOT_CONFIG`: Path to config file
    /// - `FAQBOT_PROVIDER` / `FAQBOT_MODEL`: Language model provider and model
    /// - `FAQBOT_API_KEY`: Language model API key
    /// - `FAQBOT_INDEX_NAME` / `FAQBOT_NAMESPACE`: Vector index and namespace
    /// - `FAQBOT_TOP_K` / `FAQBOT_SIMILARITY_THRESHOLD`: Retriever tuning
    /// - `FAQBOT_OPTIMIZED_PATH`: Saved optimized module
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use faqbot_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Index: {}", config.index.name);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load configuration using a custom environment lookup.
    pub fn load_with<F>(env: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(config_file) = env("FAQBOT_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Some(provider) = env("FAQBOT_PROVIDER") {
            config.provider = provider;
        }

        if let Some(model) = env("FAQBOT_MODEL") {
            config.model = model;
        }

        if let Some(index_name) = env("FAQBOT_INDEX_NAME") {
            config.index.name = index_name;
        }

        if let Some(namespace) = env("FAQBOT_NAMESPACE") {
            config.index.namespace = namespace;
        }

        if let Some(top_k) = env("FAQBOT_TOP_K") {
            config.retrieval.top_k = top_k.parse().map_err(|_| {
                AppError::Config(format!("FAQBOT_TOP_K is not a positive integer: {}", top_k))
            })?;
        }

        if let Some(threshold) = env("FAQBOT_SIMILARITY_THRESHOLD") {
            config.retrieval.similarity_threshold = threshold.parse().map_err(|_| {
                AppError::Config(format!(
                    "FAQBOT_SIMILARITY_THRESHOLD is not a number: {}",
                    threshold
                ))
            })?;
        }

        if let Some(path) = env("FAQBOT_OPTIMIZED_PATH") {
            config.optimized_path = Some(PathBuf::from(path));
        }

        config.api_key = env("FAQBOT_API_KEY");

        if let Some(level) = env("RUST_LOG") {
            config.log_level = Some(level);
        }

        if env("NO_COLOR").is_some() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();
        result.config_file = Some(path.to_path_buf());

        if let Some(llm) = config_file.llm {
            if let Some(provider) = llm.provider {
                result.provider = provider;
            }
            if let Some(model) = llm.model {
                result.model = model;
            }
            if llm.endpoint.is_some() {
                result.llm_endpoint = llm.endpoint;
            }
            if let Some(api_key_env) = llm.api_key_env {
                result.api_key_env = api_key_env;
            }
        }

        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }
        if let Some(index) = config_file.index {
            result.index = index;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(answer) = config_file.answer {
            result.answer = answer;
        }
        if let Some(path) = config_file.optimized_path {
            result.optimized_path = Some(PathBuf::from(path));
        }
        if let Some(secs) = config_file.request_timeout_secs {
            result.request_timeout_secs = secs;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.log_format = format;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over the file and environment.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        provider: Option<String>,
        model: Option<String>,
        top_k: Option<usize>,
        threshold: Option<f32>,
        optimized_path: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(top_k) = top_k {
            self.retrieval.top_k = top_k;
        }

        if let Some(threshold) = threshold {
            self.retrieval.similarity_threshold = threshold;
        }

        if let Some(path) = optimized_path {
            self.optimized_path = Some(path);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Resolve the language model API key.
    ///
    /// `FAQBOT_API_KEY` wins; otherwise the variable named by `api_key_env` is read.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }
        std::env::var(&self.api_key_env).ok()
    }

    /// Resolve the vector index API key from its environment variable.
    pub fn resolve_index_api_key(&self) -> Option<String> {
        std::env::var(&self.index.api_key_env).ok()
    }

    /// Validate configuration before any client is built.
    pub fn validate(&self) -> AppResult<()> {
        check_known("provider", &self.provider, &KNOWN_PROVIDERS)?;
        check_known(
            "embedding provider",
            &self.embedding.provider,
            &KNOWN_EMBEDDING_PROVIDERS,
        )?;
        check_known("index backend", &self.index.backend, &KNOWN_BACKENDS)?;
        check_known(
            "threshold mode",
            &self.retrieval.threshold_mode,
            &THRESHOLD_MODES,
        )?;
        check_known("query mode", &self.retrieval.query_mode, &QUERY_MODES)?;
        check_known("history order", &self.answer.history_order, &HISTORY_ORDERS)?;
        check_known(
            "empty context policy",
            &self.answer.empty_context,
            &EMPTY_CONTEXT_POLICIES,
        )?;

        if self.retrieval.top_k == 0 {
            return Err(AppError::Config("topK must be at least 1".to_string()));
        }

        if !self.retrieval.similarity_threshold.is_finite() {
            return Err(AppError::Config(
                "similarityThreshold must be a finite number".to_string(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(AppError::Config(
                "requestTimeoutSecs must be at least 1".to_string(),
            ));
        }

        if self.provider == "openai" && self.resolve_api_key().is_none() {
            return Err(AppError::Config(format!(
                "API key not found in environment variable: {}",
                self.api_key_env
            )));
        }

        match self.index.backend.as_str() {
            "pinecone" => {
                if self.resolve_index_api_key().is_none() {
                    return Err(AppError::Config(format!(
                        "Index API key not found in environment variable: {}",
                        self.index.api_key_env
                    )));
                }
            }
            "memory" => {
                if self.index.memory_path.is_none() && self.retrieval.query_mode == "text" {
                    tracing::warn!("Memory index has no memoryPath; it will start empty");
                }
            }
            _ => {}
        }

        Ok(())
    }
}

fn check_known(what: &str, value: &str, known: &[&str]) -> AppResult<()> {
    if known.contains(&value) {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "Unknown {}: {}. Supported: {}",
            what,
            value,
            known.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.index.name, "fintech-faqs");
        assert_eq!(config.index.namespace, "__default__");
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.similarity_threshold, 0.7);
        assert_eq!(config.answer.history_limit, 3);
        assert!(!config.verbose);
    }

    #[test]
    fn test_env_overrides() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("absent.yaml");
        let missing = missing.to_string_lossy().to_string();

        // An explicitly named but absent file is an error
        let err = AppConfig::load_with(env_from(&[("FAQBOT_CONFIG", &missing)]));
        assert!(err.is_err());

        let path = temp.path().join("faqbot.yaml");
        std::fs::write(&path, "retrieval:\n  topK: 7\n").unwrap();
        let path = path.to_string_lossy().to_string();

        let config = AppConfig::load_with(env_from(&[
            ("FAQBOT_CONFIG", &path),
            ("FAQBOT_MODEL", "gpt-4o"),
            ("FAQBOT_SIMILARITY_THRESHOLD", "0.55"),
            ("FAQBOT_NAMESPACE", "faqs"),
        ]))
        .unwrap();

        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.retrieval.top_k, 7);
        assert_eq!(config.retrieval.similarity_threshold, 0.55);
        assert_eq!(config.index.namespace, "faqs");
    }

    #[test]
    fn test_invalid_numeric_env_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("faqbot.yaml");
        std::fs::write(&path, "{}\n").unwrap();
        let path = path.to_string_lossy().to_string();

        let result =
            AppConfig::load_with(env_from(&[("FAQBOT_CONFIG", &path), ("FAQBOT_TOP_K", "many")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_yaml_sections() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("faqbot.yaml");
        std::fs::write(
            &path,
            r#"
llm:
  provider: ollama
  model: llama3.2
index:
  backend: memory
  name: support
  memoryPath: passages.jsonl
retrieval:
  similarityThreshold: 0.5
  thresholdMode: exclusive
answer:
  historyLimit: 5
logging:
  level: debug
  color: false
  format: json
"#,
        )
        .unwrap();

        let config = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.index.backend, "memory");
        assert_eq!(config.index.namespace, "__default__");
        assert_eq!(config.retrieval.threshold_mode, "exclusive");
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.answer.history_limit, 5);
        assert_eq!(config.log_level, Some("debug".to_string()));
        assert!(config.no_color);
        assert_eq!(config.log_format, "json");
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            Some("ollama".to_string()),
            Some("llama3.2".to_string()),
            Some(5),
            Some(0.8),
            None,
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "ollama");
        assert_eq!(overridden.model, "llama3.2");
        assert_eq!(overridden.retrieval.top_k, 5);
        assert_eq!(overridden.retrieval.similarity_threshold, 0.8);
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let config = AppConfig {
            provider: "unknown".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_unknown_threshold_mode() {
        let mut config = local_config();
        config.retrieval.threshold_mode = "fuzzy".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("threshold mode"));
    }

    #[test]
    fn test_validate_zero_top_k() {
        let mut config = local_config();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_local_setup() {
        assert!(local_config().validate().is_ok());
    }

    fn local_config() -> AppConfig {
        let mut config = AppConfig {
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            ..AppConfig::default()
        };
        config.embedding.provider = "mock".to_string();
        config.index.backend = "memory".to_string();
        config.index.memory_path = Some(PathBuf::from("passages.jsonl"));
        config
    }
}
