//! Minimal TOML-frontmatter skill file format: `+++<toml>+++<markdown body>`.

use chrono::{DateTime, Utc};
use content_core::types::{Skill, SkillCategory, SkillStatus};
use content_core::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

const DELIM: &str = "+++";

#[derive(Debug, Serialize, Deserialize)]
struct Frontmatter {
    name: String,
    category: SkillCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    platform: Option<String>,
    confidence: f64,
    status: SkillStatus,
    version: u32,
    #[serde(default)]
    tags: Vec<String>,
    total_uses: u32,
    success_count: u32,
    failure_streak: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_used_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_validated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    change_reason: Option<String>,
}

pub fn parse(raw: &str, file_path: &str) -> CoreResult<Skill> {
    let rest = raw
        .strip_prefix(DELIM)
        .ok_or_else(|| CoreError::MalformedResponse(format!("{file_path}: missing frontmatter delimiter")))?;
    let (meta_str, body) = rest
        .split_once(DELIM)
        .ok_or_else(|| CoreError::MalformedResponse(format!("{file_path}: unterminated frontmatter")))?;
    let meta: Frontmatter = toml::from_str(meta_str.trim())
        .map_err(|e| CoreError::MalformedResponse(format!("{file_path}: {e}")))?;

    Ok(Skill {
        name: meta.name,
        category: meta.category,
        platform: meta.platform,
        confidence: meta.confidence,
        status: meta.status,
        version: meta.version,
        content: body.trim_start_matches('\n').to_string(),
        tags: meta.tags,
        file_path: file_path.to_string(),
        total_uses: meta.total_uses,
        success_count: meta.success_count,
        failure_streak: meta.failure_streak,
        last_used_at: meta.last_used_at,
        last_validated_at: meta.last_validated_at,
        created_at: meta.created_at,
        updated_at: meta.updated_at,
    })
}

/// Renders a skill back to its frontmatter file. `change_reason` is a
/// write-only note on the archived version, not a tracked skill field — it
/// is stamped into this write's metadata only and dropped again on the next
/// `parse` (mirrors the source, whose skill record carries no such column).
pub fn render(skill: &Skill, change_reason: Option<&str>) -> CoreResult<String> {
    let meta = Frontmatter {
        name: skill.name.clone(),
        category: skill.category,
        platform: skill.platform.clone(),
        confidence: skill.confidence,
        status: skill.status,
        version: skill.version,
        tags: skill.tags.clone(),
        total_uses: skill.total_uses,
        success_count: skill.success_count,
        failure_streak: skill.failure_streak,
        last_used_at: skill.last_used_at,
        last_validated_at: skill.last_validated_at,
        created_at: skill.created_at,
        updated_at: skill.updated_at,
        change_reason: change_reason.filter(|r| !r.is_empty()).map(str::to_string),
    };
    let meta_str = toml::to_string_pretty(&meta).map_err(|e| CoreError::Config(e.to_string()))?;
    Ok(format!("{DELIM}\n{meta_str}{DELIM}\n\n{}\n", skill.content.trim_end()))
}
