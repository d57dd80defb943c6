use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use content_core::types::{clamp01, DiscoveryStatus, RiskLevel, SkillOutcome};
use content_core::CoreResult;
use content_providers::LlmProvider;
use content_skills::{OutcomeBus, SkillLibrary};
use content_store::Store;

const BATCH_SIZE: usize = 20;
const MAX_TOKENS: u32 = 2000;

const ANALYST_SYSTEM_PROMPT: &str = "You are a content analyst for an autonomous publishing system. Evaluate each content item for arbitrage potential.\n\nScore each item on:\n- relevance_score (0.0-1.0): How relevant is this to AI, automation, and the future of work?\n- velocity_score (0.0-1.0): How fast is this trending? Higher = faster spread.\n- risk_level (\"low\", \"medium\", \"high\"): Brand risk assessment.\n- platform_fit: {\"linkedin\": 0.0-1.0, \"twitter\": 0.0-1.0, \"youtube\": 0.0-1.0, \"tiktok\": 0.0-1.0}\n- suggested_formats: list of format types like \"post\", \"thread\", \"short\", \"article\", \"carousel\"\n\nReturn a valid JSON array with one object per item, keyed by source_id.";

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").unwrap());

#[derive(Debug, Deserialize, Default)]
struct AnalystItemScore {
    source_id: Option<String>,
    #[serde(default)]
    relevance_score: f64,
    #[serde(default)]
    velocity_score: f64,
    #[serde(default = "default_risk")]
    risk_level: String,
    #[serde(default)]
    platform_fit: BTreeMap<String, f64>,
    #[serde(default)]
    suggested_formats: Vec<String>,
}

fn default_risk() -> String {
    "medium".to_string()
}

fn parse_risk_level(s: &str) -> RiskLevel {
    match s {
        "low" => RiskLevel::Low,
        "high" => RiskLevel::High,
        _ => RiskLevel::Medium,
    }
}

fn extract_json(text: &str) -> String {
    if let Some(caps) = CODE_FENCE.captures(text) {
        return caps[1].trim().to_string();
    }
    text.trim().to_string()
}

#[derive(Debug, Clone, Default)]
pub struct AnalystReport {
    pub analyzed: usize,
    pub errors: usize,
    pub total_pending: usize,
}

/// Batches newly discovered items through an LLM scoring pass, clamping
/// every score the model returns before it is trusted anywhere downstream
/// (§4.2, §7 invariant on numeric fields from untrusted providers).
pub struct Analyst<'a> {
    store: &'a Store,
    skills: &'a SkillLibrary,
    llm: &'a dyn LlmProvider,
}

impl<'a> Analyst<'a> {
    pub fn new(store: &'a Store, skills: &'a SkillLibrary, llm: &'a dyn LlmProvider) -> Self {
        Self { store, skills, llm }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> CoreResult<AnalystReport> {
        let skills = self.skills.get_for_task("source_scoring", None);
        let skills_text = format_skills_for_prompt(&skills);

        let mut discoveries = self.store.discoveries_by_status(DiscoveryStatus::New)?;
        discoveries.sort_by(|a, b| b.discovered_at.cmp(&a.discovered_at));

        if discoveries.is_empty() {
            tracing::info!("analyst: no new discoveries to analyze");
            return Ok(AnalystReport::default());
        }

        let total_pending = discoveries.len();
        let mut analyzed = 0usize;
        let mut errors = 0usize;

        for (batch_idx, batch) in discoveries.chunks(BATCH_SIZE).enumerate() {
            match self.analyze_batch(batch, &skills_text, now).await {
                Ok((batch_analyzed, batch_errors)) => {
                    analyzed += batch_analyzed;
                    errors += batch_errors;
                }
                Err(err) => {
                    tracing::error!(batch = batch_idx, error = %err, "analyst batch failed");
                    errors += batch.len();
                }
            }
        }

        tracing::info!(analyzed, errors, total_pending, "analyst complete");

        if !skills.is_empty() {
            let bus = OutcomeBus::new(self.skills);
            let outcome = if analyzed > 0 { SkillOutcome::Success } else { SkillOutcome::Failure };
            let score = analyzed as f64 / total_pending.max(1) as f64;
            for skill in &skills {
                bus.record(&skill.name, "analyst", "source_scoring", outcome, score, serde_json::json!({}), now)?;
            }
        }

        Ok(AnalystReport { analyzed, errors, total_pending })
    }

    async fn analyze_batch(
        &self,
        batch: &[content_core::types::Discovery],
        skills_text: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<(usize, usize)> {
        let items_text: Vec<String> = batch
            .iter()
            .map(|d| {
                format!(
                    "- source_id: {}\n  title: {}\n  url: {}\n  source: {}\n  raw_score: {}",
                    d.source_id, d.title, d.url, d.source, d.raw_score
                )
            })
            .collect();

        let mut system_prompt = ANALYST_SYSTEM_PROMPT.to_string();
        if !skills_text.is_empty() {
            system_prompt.push_str(&format!("\n\nAvailable skills:\n{skills_text}"));
        }
        let user_prompt = format!(
            "Analyze the following content items and return a JSON array:\n\n{}",
            items_text.join("\n")
        );

        let response = self.llm.complete(&system_prompt, &user_prompt, MAX_TOKENS, true).await?;
        let cleaned = extract_json(&response.text);

        let scores: Vec<AnalystItemScore> = match serde_json::from_str(&cleaned) {
            Ok(v) => v,
            Err(err) => {
                tracing::error!(error = %err, "failed to parse analyst response");
                return Ok((0, batch.len()));
            }
        };

        let mut score_map: BTreeMap<String, AnalystItemScore> = BTreeMap::new();
        for item in scores {
            if let Some(sid) = &item.source_id {
                score_map.insert(sid.clone(), item);
            }
        }

        let mut analyzed = 0;
        let mut errors = 0;

        for d in batch {
            match score_map.get(&d.source_id) {
                Some(item) => {
                    self.store.mutate_discovery(d.id, |discovery| {
                        discovery.relevance_score = Some(clamp01(item.relevance_score));
                        discovery.velocity_score = Some(clamp01(item.velocity_score));
                        discovery.risk_level = Some(parse_risk_level(&item.risk_level));
                        discovery.platform_fit = item.platform_fit.iter().map(|(k, v)| (k.clone(), clamp01(*v))).collect();
                        discovery.suggested_formats = item.suggested_formats.iter().cloned().collect::<BTreeSet<_>>();
                        discovery.status = DiscoveryStatus::Analyzed;
                        discovery.analyzed_at = Some(now);
                    })?;
                    analyzed += 1;
                }
                None => {
                    tracing::warn!(source_id = %d.source_id, title = %d.title, "no scores returned for discovery");
                    errors += 1;
                }
            }
        }

        Ok((analyzed, errors))
    }
}

fn format_skills_for_prompt(skills: &[content_core::types::Skill]) -> String {
    skills
        .iter()
        .map(|s| format!("- {}: {}", s.name, s.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use content_providers::LlmResponse;

    struct StubLlm {
        response: String,
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn provider_name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, _system: &str, _user: &str, _max_tokens: u32, _json_mode: bool) -> CoreResult<LlmResponse> {
            Ok(LlmResponse {
                text: self.response.clone(),
                input_tokens: 10,
                output_tokens: 10,
                model: "stub".into(),
                provider: "stub".into(),
                latency_ms: 1.0,
                cost_usd: 0.0,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn store_and_skills() -> (tempfile::TempDir, Store, SkillLibrary) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("db")).unwrap();
        let skills_store = Store::open(dir.path().join("skills_db")).unwrap();
        let skills = SkillLibrary::new(dir.path().join("library"), skills_store);
        (dir, store, skills)
    }

    #[tokio::test]
    async fn scores_clamp_out_of_range_values() {
        let (_dir, store, skills) = store_and_skills();
        let item = content_core::types::DiscoveryItem {
            source: "hackernews".into(),
            source_id: "abc".into(),
            title: "Something".into(),
            url: "https://x".into(),
            raw_score: 10.0,
            raw_data: serde_json::json!({}),
            discovered_at: Utc::now(),
        };
        store.insert_discovery_if_new(item).unwrap();

        let llm = StubLlm {
            response: r#"```json
            [{"source_id": "abc", "relevance_score": 1.8, "velocity_score": -0.4, "risk_level": "high", "platform_fit": {"linkedin": 1.5}, "suggested_formats": ["post"]}]
            ```"#
                .to_string(),
        };

        let analyst = Analyst::new(&store, &skills, &llm);
        let report = analyst.run(Utc::now()).await.unwrap();
        assert_eq!(report.analyzed, 1);
        assert_eq!(report.errors, 0);

        let discoveries = store.discoveries_by_status(DiscoveryStatus::Analyzed).unwrap();
        let d = &discoveries[0];
        assert_eq!(d.relevance_score, Some(1.0));
        assert_eq!(d.velocity_score, Some(0.0));
        assert_eq!(d.platform_fit["linkedin"], 1.0);
    }

    #[tokio::test]
    async fn missing_score_for_item_counts_as_error() {
        let (_dir, store, skills) = store_and_skills();
        let item = content_core::types::DiscoveryItem {
            source: "hackernews".into(),
            source_id: "missing".into(),
            title: "Something".into(),
            url: "https://x".into(),
            raw_score: 10.0,
            raw_data: serde_json::json!({}),
            discovered_at: Utc::now(),
        };
        store.insert_discovery_if_new(item).unwrap();

        let llm = StubLlm {
            response: "[]".to_string(),
        };
        let analyst = Analyst::new(&store, &skills, &llm);
        let report = analyst.run(Utc::now()).await.unwrap();
        assert_eq!(report.analyzed, 0);
        assert_eq!(report.errors, 1);
    }
}
