//! Entity definitions for the content pipeline: discoveries, creations,
//! publications, metrics, skills, experiments and the cost ledger.
//!
//! These are plain records. Nothing here has behavior beyond simple
//! conversions and clamping helpers — confidence math, routing decisions and
//! the rest live in the crates that own those operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// Every persisted entity is addressed by a process-wide monotonic id.
pub type Id = u64;

/// `SHA256(title|url)`, used as the dedup key for discoveries.
pub fn content_hash(title: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"|");
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Clamp a score into `[0, 1]`. The Analyst applies this to every field an
/// LLM response claims is already normalized — the provider is not trusted.
pub fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Raw item returned by a `SourceAdapter::fetch()` call, before dedup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryItem {
    pub source: String,
    pub source_id: String,
    pub title: String,
    pub url: String,
    pub raw_score: f64,
    #[serde(default)]
    pub raw_data: serde_json::Value,
    pub discovered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStatus {
    New,
    Analyzed,
    Queued,
    Published,
    Skipped,
}

/// A deduplicated, persisted discovery. Scored in place by the Analyst.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discovery {
    pub id: Id,
    pub source: String,
    pub source_id: String,
    pub title: String,
    pub url: String,
    pub raw_score: f64,
    pub raw_data: serde_json::Value,
    pub content_hash: String,
    pub status: DiscoveryStatus,
    pub relevance_score: Option<f64>,
    pub velocity_score: Option<f64>,
    pub risk_level: Option<RiskLevel>,
    pub platform_fit: BTreeMap<String, f64>,
    pub suggested_formats: BTreeSet<String>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub discovered_at: DateTime<Utc>,
}

impl Discovery {
    pub fn from_item(id: Id, item: DiscoveryItem) -> Self {
        Self {
            id,
            content_hash: content_hash(&item.title, &item.url),
            source: item.source,
            source_id: item.source_id,
            title: item.title,
            url: item.url,
            raw_score: item.raw_score,
            raw_data: item.raw_data,
            status: DiscoveryStatus::New,
            relevance_score: None,
            velocity_score: None,
            risk_level: None,
            platform_fit: BTreeMap::new(),
            suggested_formats: BTreeSet::new(),
            analyzed_at: None,
            discovered_at: item.discovered_at,
        }
    }

    /// Combined ranking key the Creator orders analyzed discoveries by.
    pub fn creator_rank(&self) -> f64 {
        self.relevance_score.unwrap_or(0.0) + self.velocity_score.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    PendingReview,
    AutoApproved,
    Approved,
    Rejected,
    QualityRejected,
}

impl ApprovalStatus {
    /// Terminal states never transition further.
    pub fn is_terminal(self) -> bool {
        matches!(self, ApprovalStatus::Rejected | ApprovalStatus::QualityRejected)
    }
}

/// The eight video payload shapes a `VideoProvider` can be asked to produce.
/// Each carries exactly the fields its generation method needs; the core
/// never inspects `script`/`prompt`/`composition` beyond routing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoType {
    AvatarTalkingHead,
    AvatarAgent,
    MotionGraphics,
    HybridAvatarBroll,
    KineticText,
    CinematicBroll,
    ImageToVideo,
    MultiShotNarrative,
}

impl VideoType {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Some(match s.as_str() {
            "avatar_talking_head" => VideoType::AvatarTalkingHead,
            "avatar_agent" => VideoType::AvatarAgent,
            "motion_graphics" => VideoType::MotionGraphics,
            "hybrid_avatar_broll" => VideoType::HybridAvatarBroll,
            "kinetic_text" => VideoType::KineticText,
            "cinematic_broll" => VideoType::CinematicBroll,
            "image_to_video" => VideoType::ImageToVideo,
            "multi_shot_narrative" => VideoType::MultiShotNarrative,
            _ => return None,
        })
    }

    /// Whether this type is driven by a script, a prompt, or a shot composition.
    pub fn requires_script(self) -> bool {
        matches!(self, VideoType::AvatarTalkingHead)
    }

    pub fn requires_prompt(self) -> bool {
        matches!(
            self,
            VideoType::AvatarAgent
                | VideoType::MotionGraphics
                | VideoType::KineticText
                | VideoType::CinematicBroll
                | VideoType::ImageToVideo
        )
    }

    pub fn requires_composition(self) -> bool {
        matches!(self, VideoType::HybridAvatarBroll | VideoType::MultiShotNarrative)
    }
}

/// Deferred media descriptor persisted on a Creation. Only ever filled with
/// the fields its `video_type` requires; generation happens later, gated on
/// human approval (§4.6 step 4, §4.6 Variant selection).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeferredVideo {
    pub video_type: Option<VideoType>,
    pub video_type_rationale: Option<String>,
    pub video_script: Option<String>,
    pub video_prompt: Option<String>,
    pub video_composition: Option<Vec<String>>,
}

impl DeferredVideo {
    pub fn is_set(&self) -> bool {
        self.video_type.is_some()
            && (self.video_script.is_some()
                || self.video_prompt.is_some()
                || self.video_composition.is_some())
    }
}

/// One media asset attached to a Creation: an image generated eagerly, or a
/// video generated later via the deferred path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaAsset {
    Image { url: String },
    Video { url: String, source: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Creation {
    pub id: Id,
    pub discovery_id: Id,
    pub platform: String,
    pub format: String,
    pub title: String,
    pub body: String,
    pub media_urls: Vec<MediaAsset>,
    pub skills_used: Vec<String>,
    pub risk_score: Option<f64>,
    pub risk_flags: Vec<String>,
    pub quality_score: Option<f64>,
    pub quality_issues: Vec<String>,
    pub variant_group: Option<String>,
    pub variant_label: Option<String>,
    pub approval_status: ApprovalStatus,
    pub video: DeferredVideo,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publication {
    pub id: Id,
    pub creation_id: Id,
    pub platform: String,
    pub platform_post_id: String,
    pub platform_url: Option<String>,
    pub arbitrage_window_minutes: Option<i64>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricInterval {
    H1,
    H6,
    H24,
    H48,
    D7,
}

impl MetricInterval {
    pub const ALL: [MetricInterval; 5] = [
        MetricInterval::H1,
        MetricInterval::H6,
        MetricInterval::H24,
        MetricInterval::H48,
        MetricInterval::D7,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MetricInterval::H1 => "1h",
            MetricInterval::H6 => "6h",
            MetricInterval::H24 => "24h",
            MetricInterval::H48 => "48h",
            MetricInterval::D7 => "7d",
        }
    }

    pub fn offset(self) -> chrono::Duration {
        match self {
            MetricInterval::H1 => chrono::Duration::hours(1),
            MetricInterval::H6 => chrono::Duration::hours(6),
            MetricInterval::H24 => chrono::Duration::hours(24),
            MetricInterval::H48 => chrono::Duration::hours(48),
            MetricInterval::D7 => chrono::Duration::days(7),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EngagementSnapshot {
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    pub clicks: u64,
    pub followers_gained: u64,
    pub engagement_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub id: Id,
    pub publication_id: Id,
    pub interval: MetricInterval,
    pub snapshot: EngagementSnapshot,
    pub collected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillStatus {
    Active,
    Stale,
    UnderReview,
    Retired,
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Sources,
    Creation,
    Platform,
    Tools,
    Engagement,
    Timing,
}

impl SkillCategory {
    /// Mirrors the task-type to category mapping the skill library routes
    /// `get_for_task` queries through.
    pub fn for_task_type(task_type: &str) -> Option<Self> {
        Some(match task_type {
            "source_scoring" => SkillCategory::Sources,
            "content_creation" => SkillCategory::Creation,
            "platform_optimization" => SkillCategory::Platform,
            "engagement" => SkillCategory::Engagement,
            "timing" => SkillCategory::Timing,
            "tool_usage" => SkillCategory::Tools,
            _ => return None,
        })
    }
}

pub const CONFIDENCE_FLOOR: f64 = 0.20;
pub const CONFIDENCE_CEILING: f64 = 0.95;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub category: SkillCategory,
    pub platform: Option<String>,
    pub confidence: f64,
    pub status: SkillStatus,
    pub version: u32,
    pub content: String,
    pub tags: Vec<String>,
    pub file_path: String,
    pub total_uses: u32,
    pub success_count: u32,
    pub failure_streak: u32,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_validated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Skill {
    pub fn new(name: impl Into<String>, category: SkillCategory, content: impl Into<String>, at: DateTime<Utc>) -> Self {
        let name = name.into();
        Self {
            file_path: format!("{name}.md"),
            name,
            category,
            platform: None,
            confidence: 0.5,
            status: SkillStatus::Active,
            version: 1,
            content: content.into(),
            tags: Vec::new(),
            total_uses: 0,
            success_count: 0,
            failure_streak: 0,
            last_used_at: None,
            last_validated_at: None,
            created_at: at,
            updated_at: at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillOutcome {
    Success,
    Partial,
    Failure,
}

impl SkillOutcome {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.6 {
            SkillOutcome::Success
        } else if score >= 0.3 {
            SkillOutcome::Partial
        } else {
            SkillOutcome::Failure
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillMetric {
    pub id: Id,
    pub skill_name: String,
    pub agent: String,
    pub task: String,
    pub outcome: SkillOutcome,
    pub score: f64,
    pub context: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

/// Co-occurrence tracking between two skills used on the same creation.
/// Supplemented per SPEC_FULL §10.1; feeds SkillSynthesizer only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillInteraction {
    pub skill_a: String,
    pub skill_b: String,
    pub co_occurrences: u32,
    pub avg_combined_score: f64,
    pub recorded_at: DateTime<Utc>,
}

impl SkillInteraction {
    /// Canonical unordered pair key so `(a, b)` and `(b, a)` land on one row.
    pub fn pair_key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentWinner {
    A,
    B,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Running,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: Id,
    pub skill_name: String,
    pub variant_a_description: String,
    pub variant_b_description: String,
    pub metric_target: String,
    pub variant_a_score: f64,
    pub variant_b_score: f64,
    pub sample_size_a: u32,
    pub sample_size_b: u32,
    pub winner: Option<ExperimentWinner>,
    pub status: ExperimentStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRunStatus {
    Completed,
    Failed,
}

/// One row in the cost ledger. Written for every provider call regardless of
/// outcome (§7 propagation policy).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRun {
    pub id: Id,
    pub agent: String,
    pub task: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub estimated_cost_usd: f64,
    pub duration_seconds: f64,
    pub status: AgentRunStatus,
    pub provider: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable() {
        let a = content_hash("X", "https://x");
        let b = content_hash("X", "https://x");
        assert_eq!(a, b);
        assert_ne!(a, content_hash("Y", "https://x"));
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp01(-0.5), 0.0);
        assert_eq!(clamp01(1.5), 1.0);
        assert_eq!(clamp01(0.3), 0.3);
    }

    #[test]
    fn video_type_requirements_are_disjoint_by_field() {
        assert!(VideoType::AvatarTalkingHead.requires_script());
        assert!(!VideoType::AvatarTalkingHead.requires_prompt());
        assert!(VideoType::MultiShotNarrative.requires_composition());
    }
}
