use chrono::Utc;
use content_core::types::DiscoveryItem;
use content_core::{CoreError, CoreResult};

use crate::adapter::SourceAdapter;

const MIN_POINTS: f64 = 50.0;

/// Front-page stories from the Algolia-backed HN search API.
pub struct HackerNewsSource {
    client: reqwest::Client,
}

impl HackerNewsSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("reqwest client"),
        }
    }
}

impl Default for HackerNewsSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SourceAdapter for HackerNewsSource {
    fn name(&self) -> &'static str {
        "hackernews"
    }

    async fn fetch(&self) -> CoreResult<Vec<DiscoveryItem>> {
        let resp = self
            .client
            .get("https://hn.algolia.com/api/v1/search")
            .query(&[("tags", "front_page"), ("hitsPerPage", "20")])
            .send()
            .await
            .map_err(|e| CoreError::SourceAdapter {
                source: self.name().into(),
                message: e.to_string(),
            })?;
        let data: serde_json::Value = resp.json().await.map_err(|e| CoreError::SourceAdapter {
            source: self.name().into(),
            message: e.to_string(),
        })?;

        let now = Utc::now();
        let mut items = Vec::new();
        for hit in data.get("hits").and_then(|h| h.as_array()).into_iter().flatten() {
            let points = hit.get("points").and_then(|v| v.as_f64()).unwrap_or(0.0);
            if points < MIN_POINTS {
                continue;
            }
            let object_id = match hit.get("objectID").and_then(|v| v.as_str()) {
                Some(id) => id.to_string(),
                None => continue,
            };
            let url = hit
                .get("url")
                .and_then(|v| v.as_str())
                .map(String::from)
                .unwrap_or_else(|| format!("https://news.ycombinator.com/item?id={object_id}"));
            let title = hit.get("title").and_then(|v| v.as_str()).unwrap_or("").to_string();

            items.push(DiscoveryItem {
                source: self.name().into(),
                source_id: object_id,
                title,
                url,
                raw_score: points,
                raw_data: hit.clone(),
                discovered_at: now,
            });
        }
        tracing::info!(count = items.len(), "hackernews fetch complete");
        Ok(items)
    }
}
