//! Wraps an `LlmProvider` so every completion call is logged to the cost
//! ledger `Store::cost_since` reads from — the one thing feeding the
//! degradation mode's cost ratio. Mirrors the per-call logging a base agent
//! wrapper does around its LLM client, just pushed to one shared decorator
//! instead of being duplicated in every agent.

use async_trait::async_trait;
use chrono::Utc;

use content_core::types::{AgentRun, AgentRunStatus};
use content_core::CoreResult;
use content_providers::{LlmProvider, LlmResponse};
use content_store::Store;

pub struct CostTrackingLlm<'a> {
    inner: &'a dyn LlmProvider,
    store: &'a Store,
    agent: &'static str,
}

impl<'a> CostTrackingLlm<'a> {
    pub fn new(inner: &'a dyn LlmProvider, store: &'a Store, agent: &'static str) -> Self {
        Self { inner, store, agent }
    }
}

#[async_trait]
impl<'a> LlmProvider for CostTrackingLlm<'a> {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
        json_mode: bool,
    ) -> CoreResult<LlmResponse> {
        let started_at = Utc::now();
        let start = std::time::Instant::now();
        let result = self.inner.complete(system_prompt, user_prompt, max_tokens, json_mode).await;
        let duration_seconds = start.elapsed().as_secs_f64();

        let (status, response): (AgentRunStatus, Option<LlmResponse>) = match &result {
            Ok(response) => (AgentRunStatus::Completed, Some(response.clone())),
            Err(_) => (AgentRunStatus::Failed, None),
        };

        let run = AgentRun {
            id: 0,
            agent: self.agent.to_string(),
            task: format!("{}_completion", self.agent),
            input_tokens: response.as_ref().map(|r| r.input_tokens).unwrap_or(0),
            output_tokens: response.as_ref().map(|r| r.output_tokens).unwrap_or(0),
            estimated_cost_usd: response.as_ref().map(|r| r.cost_usd).unwrap_or(0.0),
            duration_seconds,
            status,
            provider: response
                .as_ref()
                .map(|r| r.provider.clone())
                .unwrap_or_else(|| self.inner.provider_name().to_string()),
            started_at,
            completed_at: Some(Utc::now()),
        };
        if let Err(err) = self.store.insert_agent_run(run) {
            tracing::warn!(agent = self.agent, error = %err, "failed to log agent run to cost ledger");
        }

        result
    }

    async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_core::CoreError;

    struct StubLlm {
        fail: bool,
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn provider_name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, _s: &str, _u: &str, _m: u32, _j: bool) -> CoreResult<LlmResponse> {
            if self.fail {
                return Err(CoreError::Provider("boom".into()));
            }
            Ok(LlmResponse {
                text: "ok".into(),
                input_tokens: 10,
                output_tokens: 20,
                model: "stub-model".into(),
                provider: "stub".into(),
                latency_ms: 1.0,
                cost_usd: 0.05,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn successful_call_writes_cost_to_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let inner = StubLlm { fail: false };
        let tracked = CostTrackingLlm::new(&inner, &store, "analyst");
        let response = tracked.complete("sys", "user", 100, true).await.unwrap();
        assert_eq!(response.cost_usd, 0.05);
        let cost = store.cost_since(Utc::now() - chrono::Duration::days(1)).unwrap();
        assert!((cost - 0.05).abs() < 1e-9);
    }

    #[tokio::test]
    async fn failed_call_logs_zero_cost_and_propagates_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let inner = StubLlm { fail: true };
        let tracked = CostTrackingLlm::new(&inner, &store, "analyst");
        let result = tracked.complete("sys", "user", 100, true).await;
        assert!(result.is_err());
        let cost = store.cost_since(Utc::now() - chrono::Duration::days(1)).unwrap();
        assert_eq!(cost, 0.0);
    }
}
