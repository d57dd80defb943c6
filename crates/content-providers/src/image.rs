use content_core::CoreResult;

#[derive(Debug, Clone, Default)]
pub struct ImageResult {
    pub url: Option<String>,
    pub local_path: Option<String>,
    pub error: Option<String>,
    pub provider: String,
    pub cost_usd: f64,
}

/// Text-prompt-in / image-URL-out. Cheap enough to call eagerly for every
/// Creator variant (§4.6 step 4).
#[async_trait::async_trait]
pub trait ImageProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    async fn generate(&self, prompt: &str, size: &str) -> CoreResult<ImageResult>;

    async fn health_check(&self) -> bool;
}

/// Local stand-in that fabricates a deterministic placeholder URL instead of
/// calling a generation backend.
pub struct LocalPlaceholderImage;

#[async_trait::async_trait]
impl ImageProvider for LocalPlaceholderImage {
    fn provider_name(&self) -> &str {
        "local_placeholder"
    }

    async fn generate(&self, prompt: &str, size: &str) -> CoreResult<ImageResult> {
        let hash = content_core::types::content_hash(prompt, size);
        Ok(ImageResult {
            url: Some(format!("local://images/{}.png", &hash[..16])),
            local_path: None,
            error: None,
            provider: self.provider_name().to_string(),
            cost_usd: 0.0,
        })
    }

    async fn health_check(&self) -> bool {
        true
    }
}
