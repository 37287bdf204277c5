//! Persisted optimized composer configuration.
//!
//! Only lightweight state is written: the retriever configuration, the
//! prompt program with its demos, and run metadata. Clients are rebuilt
//! from configuration when the module is applied.

use crate::composer::AnswerComposer;
use crate::retriever::RetrieverConfig;
use chrono::{DateTime, Utc};
use faqbot_core::{AppError, AppResult};
use faqbot_prompt::{validate_program, PromptProgram};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleMetadata {
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub train_examples: usize,
    /// Validation score at save time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedModule {
    pub retriever: RetrieverConfig,
    pub program: PromptProgram,
    pub metadata: ModuleMetadata,
}

impl OptimizedModule {
    /// Capture the persistable state of `composer`.
    pub fn from_composer(composer: &AnswerComposer, train_examples: usize) -> Self {
        Self {
            retriever: composer.retriever().config().clone(),
            program: composer.program().clone(),
            metadata: ModuleMetadata {
                model: composer.model().to_string(),
                created_at: Utc::now(),
                train_examples,
                score: None,
                metric: None,
            },
        }
    }

    pub fn with_score(mut self, score: f32, metric: impl Into<String>) -> Self {
        self.metadata.score = Some(score);
        self.metadata.metric = Some(metric.into());
        self
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> AppResult<()> {
        validate_program(&self.program)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, serde_json::to_string_pretty(self)?)?;

        tracing::info!(
            path = %path.display(),
            demos = self.program.demos.len(),
            "Saved optimized module"
        );
        Ok(())
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!(
                "Failed to read optimized module {}: {}",
                path.display(),
                e
            ))
        })?;

        let module: Self = serde_json::from_str(&contents)?;
        validate_program(&module.program)?;

        tracing::info!(
            path = %path.display(),
            demos = module.program.demos.len(),
            model = %module.metadata.model,
            "Loaded optimized module"
        );
        Ok(module)
    }
}

impl AnswerComposer {
    /// Apply a saved module to `base`, keeping its clients and policy.
    ///
    /// The retriever reconnects lazily with the module's configuration.
    pub fn from_module(base: &AnswerComposer, module: &OptimizedModule) -> Self {
        if module.metadata.model != base.model() {
            tracing::warn!(
                saved = %module.metadata.model,
                active = %base.model(),
                "Optimized module was built with a different model"
            );
        }

        let retriever = base.retriever().with_config(module.retriever.clone());
        base.with_retriever(retriever)
            .with_program(module.program.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::{composer, StaticIndex, ScriptedLlm};
    use faqbot_prompt::Demo;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn tuned() -> AnswerComposer {
        let base = composer(
            Arc::new(StaticIndex::new(vec![("hours", 0.9, "Open 9-5")])),
            Arc::new(ScriptedLlm::replying("ok")),
        );
        let program = base
            .program()
            .with_demos(vec![Demo::labeled("Fees?", "No monthly fees.")]);
        let config = RetrieverConfig {
            k: 5,
            threshold: 0.55,
            namespace: "faqs-v2".to_string(),
            ..base.retriever().config().clone()
        };
        base.with_retriever(base.retriever().with_config(config))
            .with_program(program)
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("models/optimized.json");

        let module = OptimizedModule::from_composer(&tuned(), 12).with_score(0.81, "semantic_f1");
        module.save(&path).unwrap();

        let loaded = OptimizedModule::load(&path).unwrap();
        assert_eq!(loaded, module);
        assert_eq!(loaded.retriever.k, 5);
        assert_eq!(loaded.program.demos.len(), 1);
    }

    #[test]
    fn test_persisted_state_is_lightweight() {
        let module = OptimizedModule::from_composer(&tuned(), 3);
        let value = serde_json::to_value(&module).unwrap();
        let retriever = value["retriever"].as_object().unwrap();
        assert!(retriever.contains_key("indexName"));
        assert!(!retriever.contains_key("index"));
        assert!(!retriever.contains_key("factory"));
    }

    #[test]
    fn test_from_module_rebuilds_unconnected() {
        let base = composer(
            Arc::new(StaticIndex::new(vec![])),
            Arc::new(ScriptedLlm::replying("ok")),
        );
        let module = OptimizedModule::from_composer(&tuned(), 3);

        let applied = AnswerComposer::from_module(&base, &module);
        assert_eq!(applied.retriever().config().namespace, "faqs-v2");
        assert_eq!(applied.program().demos.len(), 1);
        assert!(!applied.retriever().is_connected());
        assert_eq!(applied.policy(), base.policy());
    }

    #[test]
    fn test_load_missing_file() {
        let err = OptimizedModule::load(Path::new("/nonexistent/module.json")).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
