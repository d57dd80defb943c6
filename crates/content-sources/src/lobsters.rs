use chrono::Utc;
use content_core::types::DiscoveryItem;
use content_core::{CoreError, CoreResult};

use crate::adapter::SourceAdapter;

const MIN_SCORE: f64 = 20.0;
const MAX_ITEMS: usize = 15;

/// Hottest stories from lobste.rs's public JSON feed.
pub struct LobstersSource {
    client: reqwest::Client,
}

impl LobstersSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("reqwest client"),
        }
    }
}

impl Default for LobstersSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SourceAdapter for LobstersSource {
    fn name(&self) -> &'static str {
        "lobsters"
    }

    async fn fetch(&self) -> CoreResult<Vec<DiscoveryItem>> {
        let resp = self
            .client
            .get("https://lobste.rs/hottest.json")
            .send()
            .await
            .map_err(|e| CoreError::SourceAdapter {
                source: self.name().into(),
                message: e.to_string(),
            })?;
        let stories: Vec<serde_json::Value> = resp.json().await.map_err(|e| CoreError::SourceAdapter {
            source: self.name().into(),
            message: e.to_string(),
        })?;

        let now = Utc::now();
        let mut items = Vec::new();
        for story in stories.into_iter().take(MAX_ITEMS) {
            let score = story.get("score").and_then(|v| v.as_f64()).unwrap_or(0.0);
            if score < MIN_SCORE {
                continue;
            }
            let url = story
                .get("url")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .or_else(|| story.get("comments_url").and_then(|v| v.as_str()))
                .unwrap_or("")
                .to_string();
            items.push(DiscoveryItem {
                source: self.name().into(),
                source_id: story.get("short_id").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                title: story.get("title").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                url,
                raw_score: score,
                raw_data: story,
                discovered_at: now,
            });
        }
        tracing::info!(count = items.len(), "lobsters fetch complete");
        Ok(items)
    }
}
