use chrono::{DateTime, Utc};
use serde::Deserialize;

use content_core::types::{
    Creation, DeferredVideo, Discovery, DiscoveryStatus, Id, MediaAsset, Skill, SkillOutcome,
    VideoType,
};
use content_core::CoreResult;
use content_providers::{ImageProvider, LlmProvider};
use content_skills::{OutcomeBus, SkillLibrary};
use content_store::Store;

const PLATFORM_FIT_THRESHOLD: f64 = 0.6;
const DEFAULT_LIMIT: usize = 10;
const MAX_TOKENS: u32 = 1500;

const CREATOR_SYSTEM_PROMPT_HEADER: &str = "You are a content creator for an autonomous publishing system.\n\nBrand voice: calm, confident, technical, grounded. Builder-to-builder, operator-to-operator.\nCore message: this is how work actually gets done.\n\nStyle rules:\n- Short paragraphs, declarative statements, minimal adjectives\n- No buzzwords (\"revolutionary\", \"game-changing\", \"leverage AI\")\n- No exclamation points\n- No sales CTAs\n- No overly anthropomorphic AI language";

const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.7;
const LOW_CONFIDENCE_THRESHOLD: f64 = 0.3;

/// Learned failure patterns for a `(platform, format)` pair, injected into
/// the Creator's system prompt as "avoid" guidance. Implemented by
/// content-learning's FailurePatternTracker; kept as a trait here so
/// content-pipeline never depends on content-learning.
pub trait AvoidGuidanceSource: Send + Sync {
    fn avoid_guidance(&self, platform: &str, format: &str) -> Option<String>;
}

fn platform_format_prefs(platform: &str) -> &'static [&'static str] {
    match platform {
        "linkedin" => &["post", "carousel", "article"],
        "twitter" => &["thread", "post"],
        "youtube" => &["short", "article"],
        "tiktok" => &["short", "post"],
        _ => &["post"],
    }
}

fn best_format_for_platform(platform: &str, formats: &[String]) -> String {
    for pref in platform_format_prefs(platform) {
        if formats.iter().any(|f| f == pref) {
            return (*pref).to_string();
        }
    }
    formats.first().cloned().unwrap_or_else(|| "post".to_string())
}

fn style_hint(label: &str) -> &'static str {
    match label {
        "A" => "Use a bold, provocative hook. Lead with a surprising insight or contrarian take.",
        "B" => "Use a question-based hook. Lead with curiosity and build to the insight gradually.",
        "C" => "Use a story-based hook. Open with a brief anecdote or concrete example.",
        _ => "",
    }
}

#[derive(Debug, Deserialize, Default)]
struct CreatorResponse {
    title: Option<String>,
    body: Option<String>,
    image_prompt: Option<String>,
    video_type: Option<String>,
    video_type_rationale: Option<String>,
    video_script: Option<String>,
    video_prompt: Option<String>,
    video_composition: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct CreatorReport {
    pub discoveries_processed: usize,
    pub content_created: usize,
    pub errors: usize,
}

/// Produces exactly two style-variant candidates per qualifying platform
/// for each of the top analyzed discoveries (§4.6 Creator.run).
pub struct Creator<'a> {
    store: &'a Store,
    skills: &'a SkillLibrary,
    llm: &'a dyn LlmProvider,
    images: &'a dyn ImageProvider,
    avoid_guidance: Option<&'a dyn AvoidGuidanceSource>,
}

impl<'a> Creator<'a> {
    pub fn new(
        store: &'a Store,
        skills: &'a SkillLibrary,
        llm: &'a dyn LlmProvider,
        images: &'a dyn ImageProvider,
        avoid_guidance: Option<&'a dyn AvoidGuidanceSource>,
    ) -> Self {
        Self { store, skills, llm, images, avoid_guidance }
    }

    pub async fn run(&self, limit: Option<usize>, now: DateTime<Utc>) -> CoreResult<CreatorReport> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        let mut discoveries = self.store.discoveries_by_status(DiscoveryStatus::Analyzed)?;
        discoveries.sort_by(|a, b| b.creator_rank().partial_cmp(&a.creator_rank()).unwrap_or(std::cmp::Ordering::Equal));
        discoveries.truncate(limit);

        if discoveries.is_empty() {
            tracing::info!("creator: no analyzed discoveries to process");
            return Ok(CreatorReport::default());
        }

        let mut report = CreatorReport::default();

        for discovery in &discoveries {
            report.discoveries_processed += 1;
            let platforms = select_platforms(discovery);
            if platforms.is_empty() {
                tracing::info!(source_id = %discovery.source_id, "no platforms above fit threshold");
                continue;
            }

            let formats: Vec<String> = if discovery.suggested_formats.is_empty() {
                vec!["post".to_string()]
            } else {
                discovery.suggested_formats.iter().cloned().collect()
            };

            for platform in &platforms {
                let fmt = best_format_for_platform(platform, &formats);
                let variant_group = uuid::Uuid::new_v4().to_string()[..8].to_string();

                for label in ["A", "B"] {
                    match self.create_content(discovery, platform, &fmt, &variant_group, label, now).await {
                        Ok(Some(_)) => report.content_created += 1,
                        Ok(None) => {}
                        Err(err) => {
                            tracing::error!(platform = %platform, format = %fmt, label, error = %err, "error creating variant");
                            report.errors += 1;
                        }
                    }
                }
            }

            self.store.mutate_discovery(discovery.id, |d| {
                d.status = DiscoveryStatus::Queued;
            })?;
        }

        tracing::info!(
            discoveries = report.discoveries_processed,
            created = report.content_created,
            errors = report.errors,
            "creator complete"
        );
        Ok(report)
    }

    async fn create_content(
        &self,
        discovery: &Discovery,
        platform: &str,
        fmt: &str,
        variant_group: &str,
        label: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<Id>> {
        let skills = self.skills.get_for_task("content_creation", Some(platform));
        let skills_text = format_skills_for_prompt(&skills);

        let mut system_prompt = format!("{CREATOR_SYSTEM_PROMPT_HEADER}\n\nCreate {fmt} content for {platform} based on the following source material.");

        if let Some(guidance) = priority_guidance(&skills) {
            system_prompt.push_str(&format!("\n\n{guidance}"));
        }
        if let Some(avoid) = self.avoid_guidance.and_then(|src| src.avoid_guidance(platform, fmt)) {
            system_prompt.push_str(&format!("\n\n{avoid}"));
        }
        if !skills_text.is_empty() {
            system_prompt.push_str(&format!("\n\nAvailable skills:\n{skills_text}"));
        }

        let mut user_prompt = format!(
            "Source title: {}\nSource URL: {}\nSource: {}\nRelevance score: {}\nVelocity score: {}\n",
            discovery.title,
            discovery.url,
            discovery.source,
            discovery.relevance_score.unwrap_or(0.0),
            discovery.velocity_score.unwrap_or(0.0),
        );
        if let Some(summary) = discovery
            .raw_data
            .get("summary")
            .or_else(|| discovery.raw_data.get("description"))
            .or_else(|| discovery.raw_data.get("text"))
            .and_then(|v| v.as_str())
        {
            user_prompt.push_str(&format!("Summary: {summary}\n"));
        }

        user_prompt.push_str(&format!("\nCreate a {fmt} for {platform}. This is variant {label}. {} ", style_hint(label)));
        user_prompt.push_str(
            "Return JSON with keys: title, body, image_prompt, video_type (one of: avatar_talking_head, \
             avatar_agent, motion_graphics, hybrid_avatar_broll, kinetic_text, cinematic_broll, image_to_video, \
             multi_shot_narrative), video_type_rationale, and whichever of video_script / video_prompt / \
             video_composition your chosen video_type requires.",
        );

        let response = self.llm.complete(&system_prompt, &user_prompt, MAX_TOKENS, true).await?;
        let content: CreatorResponse = match serde_json::from_str(&response.text) {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(platform, fmt, "could not parse creator response");
                return Ok(None);
            }
        };

        let title = content.title.clone().unwrap_or_else(|| discovery.title.clone());
        let body = content.body.clone().unwrap_or_default();

        let mut media_urls = Vec::new();
        if let Some(prompt) = &content.image_prompt {
            match self.images.generate(prompt, "1024x1024").await {
                Ok(img) => {
                    if let Some(url) = img.url {
                        media_urls.push(MediaAsset::Image { url });
                    } else if let Some(err) = img.error {
                        tracing::warn!(error = %err, "image generation failed");
                    }
                }
                Err(err) => tracing::warn!(error = %err, "image generation error"),
            }
        }

        let video_type = content
            .video_type
            .as_deref()
            .and_then(VideoType::from_str_loose)
            .unwrap_or_else(|| infer_video_type(platform));
        let video = DeferredVideo {
            video_type: Some(video_type),
            video_type_rationale: content.video_type_rationale.clone(),
            video_script: if video_type.requires_script() { content.video_script.clone() } else { None },
            video_prompt: if video_type.requires_prompt() { content.video_prompt.clone() } else { None },
            video_composition: if video_type.requires_composition() { content.video_composition.clone() } else { None },
        };

        let skills_used: Vec<String> = skills.iter().map(|s| s.name.clone()).collect();

        let creation = Creation {
            id: 0,
            discovery_id: discovery.id,
            platform: platform.to_string(),
            format: fmt.to_string(),
            title,
            body,
            media_urls,
            skills_used: skills_used.clone(),
            risk_score: None,
            risk_flags: Vec::new(),
            quality_score: None,
            quality_issues: Vec::new(),
            variant_group: Some(variant_group.to_string()),
            variant_label: Some(label.to_string()),
            approval_status: content_core::types::ApprovalStatus::Pending,
            video,
            created_at: now,
            approved_at: None,
        };
        let id = self.store.insert_creation(creation)?;

        if !skills_used.is_empty() {
            let bus = OutcomeBus::new(self.skills);
            for skill_name in &skills_used {
                bus.record(
                    skill_name,
                    "creator",
                    &format!("create_{platform}_{fmt}"),
                    SkillOutcome::Partial,
                    0.5,
                    serde_json::json!({
                        "discovery_id": discovery.id,
                        "platform": platform,
                        "format": fmt,
                        "variant_label": label,
                    }),
                    now,
                )?;
            }
        }

        Ok(Some(id))
    }
}

fn select_platforms(discovery: &Discovery) -> Vec<String> {
    discovery
        .platform_fit
        .iter()
        .filter(|(_, score)| **score >= PLATFORM_FIT_THRESHOLD)
        .map(|(platform, _)| platform.clone())
        .collect()
}

fn infer_video_type(platform: &str) -> VideoType {
    match platform {
        "tiktok" | "youtube" => VideoType::KineticText,
        "twitter" => VideoType::MotionGraphics,
        _ => VideoType::AvatarAgent,
    }
}

fn format_skills_for_prompt(skills: &[Skill]) -> String {
    skills.iter().map(|s| format!("- {}: {}", s.name, s.content)).collect::<Vec<_>>().join("\n")
}

/// High-confidence skills get their patterns quoted verbatim; low-confidence
/// skills are named only, as a caution (§4.6 step 3).
fn priority_guidance(skills: &[Skill]) -> Option<String> {
    let high: Vec<&Skill> = skills.iter().filter(|s| s.confidence >= HIGH_CONFIDENCE_THRESHOLD).collect();
    let low: Vec<&Skill> = skills.iter().filter(|s| s.confidence <= LOW_CONFIDENCE_THRESHOLD).collect();
    if high.is_empty() && low.is_empty() {
        return None;
    }

    let mut lines = Vec::new();
    if !high.is_empty() {
        lines.push("## PRIORITY: Proven Patterns (High Confidence)".to_string());
        lines.push("These patterns have been validated through engagement data. Follow them closely:".to_string());
        for skill in &high {
            lines.push(format!("### {} (confidence: {:.0}%)", skill.name, skill.confidence * 100.0));
            let excerpt: String = skill.content.chars().take(500).collect();
            lines.push(excerpt);
        }
    }
    if !low.is_empty() {
        lines.push("## CAUTION: Underperforming Patterns".to_string());
        lines.push("These patterns have shown poor engagement. Use with caution or avoid:".to_string());
        for skill in &low {
            lines.push(format!("- {} (confidence: {:.0}%)", skill.name, skill.confidence * 100.0));
        }
    }
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use content_core::types::SkillCategory;
    use content_providers::{ImageResult, LlmResponse};
    use std::collections::BTreeMap;

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

    fn setup() -> (tempfile::TempDir, Store, SkillLibrary) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("db")).unwrap();
        let skills_store = Store::open(dir.path().join("skills_db")).unwrap();
        let skills = SkillLibrary::new(dir.path().join("library"), skills_store);
        (dir, store, skills)
    }

    fn analyzed_discovery(store: &Store) -> Id {
        let item = content_core::types::DiscoveryItem {
            source: "hackernews".into(),
            source_id: "1".into(),
            title: "A breakthrough".into(),
            url: "https://x".into(),
            raw_score: 10.0,
            raw_data: serde_json::json!({}),
            discovered_at: Utc::now(),
        };
        let (id, _) = store.insert_discovery_if_new(item).unwrap();
        store
            .mutate_discovery(id, |d| {
                d.status = DiscoveryStatus::Analyzed;
                d.relevance_score = Some(0.8);
                d.velocity_score = Some(0.7);
                let mut fit = BTreeMap::new();
                fit.insert("linkedin".to_string(), 0.9);
                fit.insert("twitter".to_string(), 0.2);
                d.platform_fit = fit;
                d.suggested_formats = ["post".to_string()].into_iter().collect();
            })
            .unwrap();
        id
    }

    #[tokio::test]
    async fn creates_two_variants_for_qualifying_platform() {
        let (_dir, store, skills) = setup();
        let _id = analyzed_discovery(&store);
        let llm = StubLlm {
            response: r#"{"title": "t", "body": "b", "image_prompt": "p", "video_type": "motion_graphics", "video_prompt": "vp"}"#.to_string(),
        };
        let images = content_providers::LocalPlaceholderImage;
        let creator = Creator::new(&store, &skills, &llm, &images, None);
        let report = creator.run(None, Utc::now()).await.unwrap();
        assert_eq!(report.content_created, 2);
        assert_eq!(report.errors, 0);

        let pending = store.creations_by_approval_status(content_core::types::ApprovalStatus::Pending).unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|c| c.variant_group.is_some()));
        assert!(pending.iter().any(|c| c.variant_label.as_deref() == Some("A")));
        assert!(pending.iter().any(|c| c.variant_label.as_deref() == Some("B")));
    }

    #[tokio::test]
    async fn skips_discovery_with_no_qualifying_platform() {
        let (_dir, store, skills) = setup();
        let item = content_core::types::DiscoveryItem {
            source: "hackernews".into(),
            source_id: "2".into(),
            title: "Low fit".into(),
            url: "https://y".into(),
            raw_score: 1.0,
            raw_data: serde_json::json!({}),
            discovered_at: Utc::now(),
        };
        let (id, _) = store.insert_discovery_if_new(item).unwrap();
        store
            .mutate_discovery(id, |d| {
                d.status = DiscoveryStatus::Analyzed;
                d.platform_fit = [("linkedin".to_string(), 0.1)].into_iter().collect();
            })
            .unwrap();

        let llm = StubLlm { response: "{}".to_string() };
        let images = content_providers::LocalPlaceholderImage;
        let creator = Creator::new(&store, &skills, &llm, &images, None);
        let report = creator.run(None, Utc::now()).await.unwrap();
        assert_eq!(report.content_created, 0);
        assert_eq!(report.discoveries_processed, 1);

        let discovery = store.get_discovery(id).unwrap().unwrap();
        assert_eq!(discovery.status, DiscoveryStatus::Queued);
    }

    #[test]
    fn priority_guidance_separates_high_and_low_confidence() {
        let now = Utc::now();
        let mut high = Skill::new("proven", SkillCategory::Creation, "## Core Patterns\nDo this.", now);
        high.confidence = 0.9;
        let mut low = Skill::new("weak", SkillCategory::Creation, "body", now);
        low.confidence = 0.1;
        let guidance = priority_guidance(&[high, low]).unwrap();
        assert!(guidance.contains("PRIORITY"));
        assert!(guidance.contains("CAUTION"));
    }
}
