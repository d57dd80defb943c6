use chrono::Utc;
use content_core::types::DiscoveryItem;
use content_core::{CoreError, CoreResult};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::adapter::SourceAdapter;

static AI_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(ai|ml|llm|agent|model|neural|transformer|gpt|language model|automation|diffusion|embedding|fine.?tun|rag|vector|inference|deep.?learn|machine.?learn|generative|prompt|chat.?bot|copilot|openai|anthropic|langchain|hugging.?face|stable.?diffusion|llama|mistral|gemini)\b",
    )
    .expect("valid regex")
});

/// Scrapes github.com/trending for repositories whose description or name
/// matches an AI/ML keyword list — the one adapter in this set that parses
/// HTML rather than JSON.
pub struct GitHubTrendingSource {
    client: reqwest::Client,
}

impl GitHubTrendingSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .user_agent("content-pipeline/0.1")
                .build()
                .expect("reqwest client"),
        }
    }

    fn parse_page(&self, html: &str) -> Vec<DiscoveryItem> {
        let now = Utc::now();
        let document = Html::parse_document(html);
        let article_sel = Selector::parse("article.Box-row").unwrap();
        let h2_sel = Selector::parse("h2 a").unwrap();
        let p_sel = Selector::parse("p").unwrap();

        let mut items = Vec::new();
        for article in document.select(&article_sel) {
            let Some(link) = article.select(&h2_sel).next() else {
                continue;
            };
            let href = link.value().attr("href").unwrap_or("").trim().to_string();
            let repo_name = href.trim_start_matches('/').to_string();
            if repo_name.is_empty() {
                continue;
            }
            let description: String = article
                .select(&p_sel)
                .next()
                .map(|p| p.text().collect::<Vec<_>>().join(" ").trim().to_string())
                .unwrap_or_default();

            if !AI_KEYWORDS.is_match(&description) && !AI_KEYWORDS.is_match(&repo_name) {
                continue;
            }

            items.push(DiscoveryItem {
                source: self.name().into(),
                source_id: repo_name.clone(),
                title: repo_name.clone(),
                url: format!("https://github.com{href}"),
                raw_score: 0.0,
                raw_data: serde_json::json!({ "repo": repo_name, "description": description }),
                discovered_at: now,
            });
        }
        items
    }
}

impl Default for GitHubTrendingSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SourceAdapter for GitHubTrendingSource {
    fn name(&self) -> &'static str {
        "github_trending"
    }

    async fn fetch(&self) -> CoreResult<Vec<DiscoveryItem>> {
        let resp = self
            .client
            .get("https://github.com/trending?since=daily")
            .send()
            .await
            .map_err(|e| CoreError::SourceAdapter {
                source: self.name().into(),
                message: e.to_string(),
            })?;
        let html = resp.text().await.map_err(|e| CoreError::SourceAdapter {
            source: self.name().into(),
            message: e.to_string(),
        })?;
        let items = self.parse_page(&html);
        tracing::info!(count = items.len(), "github_trending fetch complete");
        Ok(items)
    }
}
