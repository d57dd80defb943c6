use chrono::Utc;
use content_core::types::DiscoveryItem;
use content_core::{CoreError, CoreResult};

use crate::adapter::SourceAdapter;

const MIN_SCORE: f64 = 100.0;
const SUBREDDITS: &[&str] = &[
    "MachineLearning",
    "artificial",
    "LocalLLaMA",
    "singularity",
    "ChatGPT",
    "automation",
    "SaaS",
];

/// Hot posts across a fixed list of AI/automation-adjacent subreddits,
/// fetched concurrently per subreddit.
pub struct RedditSource {
    client: reqwest::Client,
}

impl RedditSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .user_agent("content-pipeline/0.1")
                .build()
                .expect("reqwest client"),
        }
    }

    async fn fetch_subreddit(&self, subreddit: &str) -> CoreResult<Vec<DiscoveryItem>> {
        let resp = self
            .client
            .get(format!("https://www.reddit.com/r/{subreddit}/hot.json"))
            .query(&[("limit", "10")])
            .send()
            .await
            .map_err(|e| CoreError::SourceAdapter {
                source: "reddit".into(),
                message: format!("{subreddit}: {e}"),
            })?;
        let data: serde_json::Value = resp.json().await.map_err(|e| CoreError::SourceAdapter {
            source: "reddit".into(),
            message: format!("{subreddit}: {e}"),
        })?;

        let now = Utc::now();
        let mut items = Vec::new();
        let children = data
            .pointer("/data/children")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        for child in children {
            let post = child.get("data").cloned().unwrap_or(serde_json::json!({}));
            let score = post.get("score").and_then(|v| v.as_f64()).unwrap_or(0.0);
            if score < MIN_SCORE {
                continue;
            }
            let permalink = post.get("permalink").and_then(|v| v.as_str()).unwrap_or("");
            let url = if !permalink.is_empty() {
                format!("https://www.reddit.com{permalink}")
            } else {
                post.get("url").and_then(|v| v.as_str()).unwrap_or("").to_string()
            };
            items.push(DiscoveryItem {
                source: "reddit".into(),
                source_id: post.get("id").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                title: post.get("title").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                url,
                raw_score: score,
                raw_data: post,
                discovered_at: now,
            });
        }
        Ok(items)
    }
}

impl Default for RedditSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SourceAdapter for RedditSource {
    fn name(&self) -> &'static str {
        "reddit"
    }

    async fn fetch(&self) -> CoreResult<Vec<DiscoveryItem>> {
        let futures = SUBREDDITS.iter().map(|s| self.fetch_subreddit(s));
        let results = futures::future::join_all(futures).await;

        let mut items = Vec::new();
        for (subreddit, result) in SUBREDDITS.iter().zip(results) {
            match result {
                Ok(mut sub_items) => items.append(&mut sub_items),
                Err(err) => tracing::warn!(subreddit = *subreddit, error = %err, "subreddit fetch failed"),
            }
        }
        tracing::info!(count = items.len(), subreddits = SUBREDDITS.len(), "reddit fetch complete");
        Ok(items)
    }
}
