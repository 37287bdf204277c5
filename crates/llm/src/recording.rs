//! Cost accounting wrapper.
//!
//! `RecordingClient` forwards every call to an inner client and keeps the
//! per-call cost so a whole optimization run can be priced afterwards.

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use faqbot_core::AppResult;
use std::sync::{Arc, Mutex};

/// LLM client that records the cost of each successful call.
pub struct RecordingClient {
    inner: Arc<dyn LlmClient>,
    history: Mutex<Vec<Option<f64>>>,
}

impl RecordingClient {
    pub fn new(inner: Arc<dyn LlmClient>) -> Self {
        Self {
            inner,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Sum of recorded costs in USD. Unpriced calls count as zero.
    pub fn total_cost(&self) -> f64 {
        match self.history.lock() {
            Ok(history) => history.iter().map(|c| c.unwrap_or(0.0)).sum(),
            Err(poisoned) => poisoned.into_inner().iter().map(|c| c.unwrap_or(0.0)).sum(),
        }
    }

    /// Number of successful calls seen so far.
    pub fn call_count(&self) -> usize {
        match self.history.lock() {
            Ok(history) => history.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn record(&self, cost: Option<f64>) {
        match self.history.lock() {
            Ok(mut history) => history.push(cost),
            Err(poisoned) => poisoned.into_inner().push(cost),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for RecordingClient {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let response = self.inner.complete(request).await?;
        self.record(response.cost);
        Ok(response)
    }
}
