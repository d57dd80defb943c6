use content_core::CoreResult;

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub model: String,
    pub provider: String,
    pub latency_ms: f64,
    pub cost_usd: f64,
}

/// Text-in / text-out completion provider. Cloud backends (Bedrock, Ollama,
/// an OpenAI-compatible endpoint) are external collaborators; the core only
/// depends on this contract.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
        json_mode: bool,
    ) -> CoreResult<LlmResponse>;

    async fn health_check(&self) -> bool;
}

/// Deterministic local stand-in used by tests and by a cost-free `MINIMAL`
/// degradation mode: echoes the prompts back as a structurally valid JSON
/// body instead of calling out to a model.
pub struct LocalEchoLlm {
    pub model: String,
}

impl LocalEchoLlm {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }
}

#[async_trait::async_trait]
impl LlmProvider for LocalEchoLlm {
    fn provider_name(&self) -> &str {
        "local_echo"
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        _max_tokens: u32,
        _json_mode: bool,
    ) -> CoreResult<LlmResponse> {
        let text = format!(
            "{{\"title\": \"local stub\", \"body\": \"generated offline\", \"system_len\": {}, \"user_len\": {}}}",
            system_prompt.len(),
            user_prompt.len()
        );
        Ok(LlmResponse {
            input_tokens: (system_prompt.len() / 4) as u32,
            output_tokens: (text.len() / 4) as u32,
            text,
            model: self.model.clone(),
            provider: self.provider_name().to_string(),
            latency_ms: 0.0,
            cost_usd: 0.0,
        })
    }

    async fn health_check(&self) -> bool {
        true
    }
}
