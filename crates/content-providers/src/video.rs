use content_core::types::VideoType;
use content_core::CoreResult;

#[derive(Debug, Clone, Default)]
pub struct VideoResult {
    pub video_url: Option<String>,
    pub local_path: Option<String>,
    pub video_id: Option<String>,
    pub error: Option<String>,
    pub provider: String,
    pub cost_usd: f64,
    pub duration_seconds: Option<f64>,
}

/// The payload a `VideoProvider::generate` call carries, tagged by
/// `VideoType`. The core routes these fields without inspecting their
/// content (§9 design note, §6 external interfaces).
#[derive(Debug, Clone)]
pub enum VideoPayload {
    Script(String),
    Prompt(String),
    Composition(Vec<String>),
}

/// Deferred, expensive media generation. Always invoked after human
/// approval, never eagerly (§4.6 variant selection, §5 ordering guarantee ii).
#[async_trait::async_trait]
pub trait VideoProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    async fn generate(&self, video_type: VideoType, payload: VideoPayload) -> CoreResult<VideoResult>;

    async fn health_check(&self) -> bool;
}

/// Local stand-in used by tests and by any build that has not wired a real
/// video backend (HeyGen, CogVideo, ...) in.
pub struct LocalPlaceholderVideo;

#[async_trait::async_trait]
impl VideoProvider for LocalPlaceholderVideo {
    fn provider_name(&self) -> &str {
        "local_placeholder"
    }

    async fn generate(&self, video_type: VideoType, payload: VideoPayload) -> CoreResult<VideoResult> {
        let seed = match &payload {
            VideoPayload::Script(s) => s.clone(),
            VideoPayload::Prompt(p) => p.clone(),
            VideoPayload::Composition(segments) => segments.join("|"),
        };
        let hash = content_core::types::content_hash(&format!("{video_type:?}"), &seed);
        Ok(VideoResult {
            video_url: Some(format!("local://videos/{}.mp4", &hash[..16])),
            local_path: None,
            video_id: Some(hash),
            error: None,
            provider: self.provider_name().to_string(),
            cost_usd: 0.0,
            duration_seconds: Some(45.0),
        })
    }

    async fn health_check(&self) -> bool {
        true
    }
}
