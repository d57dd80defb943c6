//! Weekly strategy review: performance rollup, skill health, LLM-generated
//! recommendations, and automated stale-marking (§4.11 weekly review).

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use content_core::types::SkillStatus;
use content_core::CoreResult;
use content_providers::LlmProvider;
use content_skills::{HealthStatus, SkillEvaluator, SkillLibrary};
use content_store::Store;

const REVIEW_WINDOW_DAYS: i64 = 7;
const MAX_TOKENS: u32 = 1024;

const REVIEW_SYSTEM_PROMPT: &str = "You are a content strategy reviewer for an autonomous publishing system. \
Analyze the week's performance data and skill health, then provide 3-5 concise strategic \
recommendations. Be specific and actionable. Return a JSON array of strings.";

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PerformanceSummary {
    pub publications: usize,
    pub creations: usize,
    pub avg_engagement_rate: f64,
    pub total_views: u64,
    pub total_likes: u64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SkillHealthRow {
    pub name: String,
    pub confidence: f64,
    pub health: &'static str,
    pub stale: bool,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReviewReport {
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub performance: PerformanceSummary,
    pub skill_health: Vec<SkillHealthRow>,
    pub recommendations: Vec<String>,
    pub actions_taken: Vec<String>,
}

#[derive(Deserialize)]
struct RecommendationsArray(Vec<String>);

/// Runs the weekly review against whatever `SkillLibrary`/`Store` the
/// orchestrator already holds — no state of its own beyond the evaluator.
pub struct ReviewCycle<'a> {
    store: &'a Store,
    skills: &'a SkillLibrary,
    llm: &'a dyn LlmProvider,
    evaluator: SkillEvaluator,
}

impl<'a> ReviewCycle<'a> {
    pub fn new(store: &'a Store, skills: &'a SkillLibrary, llm: &'a dyn LlmProvider) -> Self {
        Self { store, skills, llm, evaluator: SkillEvaluator::new() }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> CoreResult<ReviewReport> {
        let window_start = now - Duration::days(REVIEW_WINDOW_DAYS);

        let performance = self.gather_performance(window_start, now)?;
        let skill_health = self.review_skill_health(now);
        let recommendations = self.generate_recommendations(&performance, &skill_health).await?;
        let actions_taken = self.take_actions(&skill_health, now)?;

        tracing::info!(
            recommendations = recommendations.len(),
            actions = actions_taken.len(),
            "weekly review complete"
        );

        Ok(ReviewReport {
            period_start: Some(window_start),
            period_end: Some(now),
            performance,
            skill_health,
            recommendations,
            actions_taken,
        })
    }

    fn gather_performance(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> CoreResult<PerformanceSummary> {
        let publications = self
            .store
            .all_publications()?
            .into_iter()
            .filter(|p| p.published_at >= start && p.published_at <= end)
            .count();

        let creations = self
            .store
            .all_creations()?
            .into_iter()
            .filter(|c| c.created_at >= start && c.created_at <= end)
            .count();

        let metrics: Vec<_> = self
            .store
            .all_metrics()?
            .into_iter()
            .filter(|m| m.collected_at >= start && m.collected_at <= end)
            .collect();

        let avg_engagement_rate = if metrics.is_empty() {
            0.0
        } else {
            metrics.iter().map(|m| m.snapshot.engagement_rate).sum::<f64>() / metrics.len() as f64
        };
        let total_views: u64 = metrics.iter().map(|m| m.snapshot.views).sum();
        let total_likes: u64 = metrics.iter().map(|m| m.snapshot.likes).sum();

        Ok(PerformanceSummary { publications, creations, avg_engagement_rate, total_views, total_likes })
    }

    fn review_skill_health(&self, now: DateTime<Utc>) -> Vec<SkillHealthRow> {
        self.skills
            .all_skills()
            .into_iter()
            .map(|skill| {
                let health = self.evaluator.check_health(&skill, now);
                let stale = self.evaluator.detect_staleness(&skill, now);
                SkillHealthRow {
                    name: skill.name,
                    confidence: skill.confidence,
                    health: match health.status {
                        HealthStatus::Healthy => "healthy",
                        HealthStatus::Warning => "warning",
                        HealthStatus::Critical => "critical",
                    },
                    stale,
                    reasons: health.reasons,
                }
            })
            .collect()
    }

    async fn generate_recommendations(
        &self,
        performance: &PerformanceSummary,
        skill_health: &[SkillHealthRow],
    ) -> CoreResult<Vec<String>> {
        let health_lines: String = skill_health
            .iter()
            .map(|s| format!("- {}: confidence={:.2}, health={}, stale={}", s.name, s.confidence, s.health, s.stale))
            .collect::<Vec<_>>()
            .join("\n");

        let user_prompt = format!(
            "Weekly Performance:\n{}\n\nSkill Health Summary:\n{}\n\nProvide 3-5 strategic recommendations as a JSON array of strings.",
            serde_json::to_string_pretty(performance).unwrap_or_default(),
            health_lines,
        );

        let response = self.llm.complete(REVIEW_SYSTEM_PROMPT, &user_prompt, MAX_TOKENS, true).await?;
        let cleaned = strip_code_fence(&response.text);
        match serde_json::from_str::<RecommendationsArray>(&cleaned) {
            Ok(RecommendationsArray(items)) => Ok(items),
            Err(_) => Ok(cleaned
                .lines()
                .map(|l| l.trim().trim_start_matches('-').trim().to_string())
                .filter(|l| !l.is_empty())
                .collect()),
        }
    }

    fn take_actions(&self, skill_health: &[SkillHealthRow], now: DateTime<Utc>) -> CoreResult<Vec<String>> {
        let mut actions = Vec::new();
        for row in skill_health {
            let Some(skill) = self.skills.get_skill(&row.name) else { continue };
            if skill.status == SkillStatus::Stale {
                continue;
            }
            if row.stale && row.confidence < 0.2 {
                self.skills.mark_stale(&row.name, now)?;
                actions.push(format!("Marked '{}' as stale (confidence={:.2})", row.name, row.confidence));
            } else if row.health == "critical" {
                self.skills.mark_stale(&row.name, now)?;
                actions.push(format!("Flagged '{}' for review (critical health)", row.name));
            }
        }
        Ok(actions)
    }
}

fn strip_code_fence(text: &str) -> String {
    if let Some(start) = text.find("```") {
        if let Some(rel_end) = text[start + 3..].find("```") {
            let mut body = text[start + 3..start + 3 + rel_end].to_string();
            if let Some(stripped) = body.strip_prefix("json") {
                body = stripped.to_string();
            }
            return body.trim().to_string();
        }
    }
    text.trim().to_string()
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

        async fn complete(&self, _s: &str, _u: &str, _m: u32, _j: bool) -> CoreResult<LlmResponse> {
            Ok(LlmResponse {
                text: self.response.clone(),
                input_tokens: 1,
                output_tokens: 1,
                model: "stub".into(),
                provider: "stub".into(),
                latency_ms: 0.0,
                cost_usd: 0.0,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn store() -> (tempfile::TempDir, Store, SkillLibrary) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("db")).unwrap();
        let skills = SkillLibrary::new(dir.path().join("skills"), Store::open(dir.path().join("db2")).unwrap());
        (dir, store, skills)
    }

    fn write_skill_file(dir: &tempfile::TempDir, name: &str, confidence: f64, created_at: DateTime<Utc>) {
        let skills_dir = dir.path().join("skills");
        std::fs::create_dir_all(&skills_dir).unwrap();
        let body = format!(
            "+++\nname = \"{name}\"\ncategory = \"creation\"\nconfidence = {confidence}\nstatus = \"active\"\nversion = 1\ntotal_uses = 1\nsuccess_count = 0\nfailure_streak = 0\ncreated_at = \"{created}\"\nupdated_at = \"{created}\"\n+++\nbody\n",
            created = created_at.to_rfc3339(),
        );
        std::fs::write(skills_dir.join(format!("{name}.md")), body).unwrap();
    }

    #[tokio::test]
    async fn low_confidence_stale_skill_gets_marked() {
        let (dir, store, skills) = store();
        let now = Utc::now();
        write_skill_file(&dir, "old-skill", 0.10, now - Duration::days(30));
        skills.load_all().unwrap();

        let llm = StubLlm { response: r#"["Double down on LinkedIn carousels", "Retire underperforming hooks", "Run another A/B test on thread openers"]"#.to_string() };
        let review = ReviewCycle::new(&store, &skills, &llm);
        let report = review.run(now).await.unwrap();
        assert_eq!(report.recommendations.len(), 3);
        assert_eq!(report.actions_taken.len(), 1);
        assert_eq!(skills.get_skill("old-skill").unwrap().status, SkillStatus::Stale);
    }

    #[test]
    fn strips_markdown_code_fence() {
        let raw = "```json\n[\"a\", \"b\"]\n```";
        assert_eq!(strip_code_fence(raw), "[\"a\", \"b\"]");
    }
}
