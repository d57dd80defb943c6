use content_core::types::{Creation, EngagementSnapshot};
use content_core::CoreResult;

#[derive(Debug, Clone)]
pub struct PublishResult {
    pub platform_post_id: String,
    pub platform_url: Option<String>,
}

/// One external publishing surface. Behavior is platform-specific and
/// treated as opaque by the core beyond this contract (§4.7).
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &'static str;

    async fn publish(&self, creation: &Creation) -> CoreResult<PublishResult>;

    async fn get_metrics(&self, platform_post_id: &str) -> CoreResult<EngagementSnapshot>;
}

/// Stand-in for platforms reachable through a generic upload API
/// (linkedin, twitter, youtube, medium). Always succeeds with a
/// deterministic placeholder id; `get_metrics` reports all zeros, which is
/// a legitimate "lossy scrape" outcome per §9 Open Question 3.
pub struct UploadPostPublisher {
    platform: String,
}

impl UploadPostPublisher {
    pub fn new(platform: impl Into<String>) -> Self {
        Self { platform: platform.into() }
    }
}

#[async_trait::async_trait]
impl Publisher for UploadPostPublisher {
    fn name(&self) -> &'static str {
        "upload_post"
    }

    async fn publish(&self, creation: &Creation) -> CoreResult<PublishResult> {
        let id = content_core::types::content_hash(&creation.title, &self.platform);
        Ok(PublishResult {
            platform_post_id: format!("up_{}", &id[..12]),
            platform_url: Some(format!("local://{}/posts/{}", self.platform, &id[..12])),
        })
    }

    async fn get_metrics(&self, _platform_post_id: &str) -> CoreResult<EngagementSnapshot> {
        Ok(EngagementSnapshot::default())
    }
}

/// TikTok has no programmatic post flow in this deployment; publishing
/// always returns the placeholder id a human operator posts manually
/// against (§4.7 contract note).
pub struct TikTokPublisher;

#[async_trait::async_trait]
impl Publisher for TikTokPublisher {
    fn name(&self) -> &'static str {
        "tiktok"
    }

    async fn publish(&self, _creation: &Creation) -> CoreResult<PublishResult> {
        Ok(PublishResult {
            platform_post_id: "pending_manual".to_string(),
            platform_url: None,
        })
    }

    async fn get_metrics(&self, platform_post_id: &str) -> CoreResult<EngagementSnapshot> {
        if platform_post_id == "pending_manual" {
            return Ok(EngagementSnapshot::default());
        }
        Ok(EngagementSnapshot::default())
    }
}

/// Routes a creation's platform to the publisher that actually knows how
/// to post there, mirroring the per-platform dispatch the tracker used to
/// pick between `UploadPostPublisher` and `TikTokPublisher`.
pub struct PublisherRegistry {
    publishers: Vec<(String, Box<dyn Publisher>)>,
}

impl PublisherRegistry {
    pub fn new() -> Self {
        Self { publishers: Vec::new() }
    }

    pub fn register(mut self, platform: impl Into<String>, publisher: Box<dyn Publisher>) -> Self {
        self.publishers.push((platform.into(), publisher));
        self
    }

    pub fn for_platform(&self, platform: &str) -> Option<&dyn Publisher> {
        self.publishers
            .iter()
            .find(|(p, _)| p == platform)
            .map(|(_, publisher)| publisher.as_ref())
    }

    /// The default wiring: every generic platform through `UploadPostPublisher`,
    /// tiktok through its own stub.
    pub fn default_registry() -> Self {
        Self::new()
            .register("linkedin", Box::new(UploadPostPublisher::new("linkedin")))
            .register("twitter", Box::new(UploadPostPublisher::new("twitter")))
            .register("youtube", Box::new(UploadPostPublisher::new("youtube")))
            .register("medium", Box::new(UploadPostPublisher::new("medium")))
            .register("tiktok", Box::new(TikTokPublisher))
    }
}

impl Default for PublisherRegistry {
    fn default() -> Self {
        Self::default_registry()
    }
}
