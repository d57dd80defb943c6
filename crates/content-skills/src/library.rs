use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use content_core::types::{Skill, SkillCategory, SkillOutcome, SkillStatus};
use content_core::{CoreError, CoreResult};
use dashmap::DashMap;

use crate::frontmatter;

const CONFIDENCE_FLOOR: f64 = content_core::types::CONFIDENCE_FLOOR;
const CONFIDENCE_CEILING: f64 = content_core::types::CONFIDENCE_CEILING;
const DECAY_PER_DAY: f64 = 0.005;
const MAX_DECAY: f64 = 0.30;
const STALE_THRESHOLD_DAYS: i64 = 7;

fn task_type_to_category(task_type: &str) -> Option<SkillCategory> {
    SkillCategory::for_task_type(task_type)
}

/// Loads, indexes, and maintains the skill library. The in-memory cache is
/// authoritative for confidence; every mutation also upserts the mirror row
/// in `content_store::Store`.
pub struct SkillLibrary {
    library_root: PathBuf,
    versions_dir: PathBuf,
    cache: DashMap<String, Skill>,
    store: content_store::Store,
}

impl SkillLibrary {
    pub fn new(library_root: impl Into<PathBuf>, store: content_store::Store) -> Self {
        let library_root = library_root.into();
        let versions_dir = library_root
            .parent()
            .map(|p| p.join("versions"))
            .unwrap_or_else(|| PathBuf::from("versions"));
        Self {
            library_root,
            versions_dir,
            cache: DashMap::new(),
            store,
        }
    }

    /// Scan `library_root` recursively for `.md` files and parse them,
    /// replacing the in-memory index. Mirrors every loaded skill into the
    /// store so range queries have something to read even before the next
    /// mutation.
    pub fn load_all(&self) -> CoreResult<Vec<Skill>> {
        self.cache.clear();
        if !self.library_root.exists() {
            return Ok(Vec::new());
        }

        let mut loaded = Vec::new();
        for entry in walk_markdown(&self.library_root)? {
            let raw = std::fs::read_to_string(&entry)?;
            let path_str = entry.to_string_lossy().to_string();
            match frontmatter::parse(&raw, &path_str) {
                Ok(skill) => {
                    self.store.upsert_skill(&skill)?;
                    self.cache.insert(skill.name.clone(), skill.clone());
                    loaded.push(skill);
                }
                Err(err) => {
                    tracing::warn!(file = %path_str, error = %err, "skipping unparseable skill file");
                }
            }
        }
        Ok(loaded)
    }

    pub fn get_skill(&self, name: &str) -> Option<Skill> {
        self.cache.get(name).map(|e| e.clone())
    }

    pub fn all_skills(&self) -> Vec<Skill> {
        self.cache.iter().map(|e| e.value().clone()).collect()
    }

    /// Active skills matching `task_type`'s category or tag, optionally
    /// narrowed by platform, sorted by confidence descending.
    pub fn get_for_task(&self, task_type: &str, platform: Option<&str>) -> Vec<Skill> {
        let category = task_type_to_category(task_type);
        let mut results: Vec<Skill> = self
            .cache
            .iter()
            .filter(|e| e.value().status == SkillStatus::Active)
            .filter(|e| {
                let matches_category = category.map(|c| c == e.value().category).unwrap_or(false);
                let matches_tag = e.value().tags.iter().any(|t| t == task_type);
                matches_category || matches_tag
            })
            .filter(|e| match (platform, &e.value().platform) {
                (Some(p), Some(sp)) => p == sp,
                _ => true,
            })
            .map(|e| e.value().clone())
            .collect();
        results.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        results
    }

    /// Bounded weighted confidence update (§4.4): decay for inactivity, then
    /// a maturity-adaptive weighted blend toward `score`, clamped to
    /// `[FLOOR, CEILING]`.
    pub fn record_outcome(
        &self,
        skill_name: &str,
        outcome: SkillOutcome,
        score: f64,
        at: DateTime<Utc>,
    ) -> CoreResult<Skill> {
        let mut skill = self
            .get_skill(skill_name)
            .ok_or_else(|| CoreError::NotFound(format!("skill {skill_name}")))?;

        if let Some(last_used) = skill.last_used_at {
            let days_since = (at - last_used).num_days();
            if days_since > 0 {
                let decay = (days_since as f64 * DECAY_PER_DAY).min(MAX_DECAY);
                skill.confidence = (skill.confidence - decay).max(CONFIDENCE_FLOOR);
            }
        }

        let weight_new = maturity_weight(skill.total_uses);
        skill.confidence = (1.0 - weight_new) * skill.confidence + weight_new * score;
        skill.confidence = skill.confidence.clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEILING);

        skill.total_uses += 1;
        skill.last_used_at = Some(at);
        skill.updated_at = at;
        if outcome == SkillOutcome::Success {
            skill.success_count += 1;
            skill.failure_streak = 0;
        } else {
            skill.failure_streak += 1;
        }

        self.persist(&skill)?;
        Ok(skill)
    }

    /// Batch correction distinct from `record_outcome`'s incremental update
    /// (§4.9 step 2): overwrites `confidence` with the simple mean of every
    /// historical `SkillMetric.score` row, guarding against in-memory drift.
    pub fn recompute_confidence(&self, skill_name: &str, mean_score: f64, at: DateTime<Utc>) -> CoreResult<Skill> {
        let mut skill = self
            .get_skill(skill_name)
            .ok_or_else(|| CoreError::NotFound(format!("skill {skill_name}")))?;
        skill.confidence = mean_score.clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEILING);
        skill.updated_at = at;
        self.persist(&skill)?;
        Ok(skill)
    }

    pub fn mark_stale(&self, skill_name: &str, at: DateTime<Utc>) -> CoreResult<()> {
        let mut skill = self
            .get_skill(skill_name)
            .ok_or_else(|| CoreError::NotFound(format!("skill {skill_name}")))?;
        skill.status = SkillStatus::Stale;
        skill.failure_streak += 1;
        skill.updated_at = at;
        self.persist(&skill)
    }

    /// Weekly maintenance sweep: decay confidence for any skill inactive 7+
    /// days. Returns the skills that actually decayed with their delta.
    pub fn apply_decay_to_all(&self, at: DateTime<Utc>) -> CoreResult<Vec<(String, f64)>> {
        let mut decayed = Vec::new();
        let names: Vec<String> = self.cache.iter().map(|e| e.key().clone()).collect();
        for name in names {
            let Some(mut skill) = self.get_skill(&name) else { continue };
            let Some(last_used) = skill.last_used_at else { continue };
            let days_since = (at - last_used).num_days();
            if days_since < STALE_THRESHOLD_DAYS {
                continue;
            }
            let old = skill.confidence;
            let decay = (days_since as f64 * DECAY_PER_DAY).min(MAX_DECAY);
            skill.confidence = (skill.confidence - decay).max(CONFIDENCE_FLOOR);
            if skill.confidence != old {
                skill.updated_at = at;
                self.persist(&skill)?;
                decayed.push((name, old - skill.confidence));
            }
        }
        Ok(decayed)
    }

    /// Archive the current file content verbatim, bump `version`, overwrite
    /// content, and rewrite the skill file.
    pub fn create_version(
        &self,
        skill_name: &str,
        new_content: &str,
        change_reason: &str,
        at: DateTime<Utc>,
    ) -> CoreResult<Skill> {
        let mut skill = self
            .get_skill(skill_name)
            .ok_or_else(|| CoreError::NotFound(format!("skill {skill_name}")))?;

        let skill_path = Path::new(&skill.file_path);
        if skill_path.exists() {
            std::fs::create_dir_all(&self.versions_dir)?;
            let timestamp = at.format("%Y%m%d_%H%M%S");
            let archive_name = format!("{}_v{}_{}.md", skill.name, skill.version, timestamp);
            std::fs::copy(skill_path, self.versions_dir.join(archive_name))?;
        }

        skill.version += 1;
        skill.content = new_content.to_string();
        skill.updated_at = at;

        if let Some(parent) = skill_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(skill_path, frontmatter::render(&skill, Some(change_reason))?)?;
        self.persist(&skill)?;
        Ok(skill)
    }

    fn persist(&self, skill: &Skill) -> CoreResult<()> {
        self.cache.insert(skill.name.clone(), skill.clone());
        self.store.upsert_skill(skill)
    }

    pub fn store(&self) -> &content_store::Store {
        &self.store
    }
}

fn maturity_weight(total_uses: u32) -> f64 {
    if total_uses < 5 {
        0.5
    } else if total_uses < 15 {
        0.4
    } else if total_uses < 30 {
        0.35
    } else {
        0.3
    }
}

fn walk_markdown(root: &Path) -> CoreResult<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("md") {
                out.push(path);
            }
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_library() -> (tempfile::TempDir, SkillLibrary) {
        let dir = tempfile::tempdir().unwrap();
        let store = content_store::Store::open(dir.path().join("db")).unwrap();
        let library = SkillLibrary::new(dir.path().join("library"), store);
        (dir, library)
    }

    #[test]
    fn confidence_update_matches_worked_example() {
        let (_dir, library) = new_library();
        let t0 = Utc::now();
        let mut skill = Skill::new("test-skill", SkillCategory::Creation, "body", t0);
        skill.confidence = 0.50;
        library.persist(&skill).unwrap();

        let updated = library
            .record_outcome("test-skill", SkillOutcome::Success, 1.0, t0)
            .unwrap();
        assert!((updated.confidence - 0.75).abs() < 1e-9);

        let t1 = t0 + chrono::Duration::days(10);
        let updated = library
            .record_outcome("test-skill", SkillOutcome::Failure, 0.0, t1)
            .unwrap();
        assert!((updated.confidence - 0.35).abs() < 1e-9);
    }

    #[test]
    fn confidence_never_leaves_bounds() {
        let (_dir, library) = new_library();
        let t0 = Utc::now();
        let mut skill = Skill::new("bounded", SkillCategory::Creation, "body", t0);
        skill.confidence = CONFIDENCE_FLOOR;
        library.persist(&skill).unwrap();
        for _ in 0..20 {
            let updated = library.record_outcome("bounded", SkillOutcome::Failure, 0.0, t0).unwrap();
            assert!(updated.confidence >= CONFIDENCE_FLOOR);
        }
    }

    #[test]
    fn create_version_stamps_change_reason_and_archives_previous_body() {
        let (_dir, library) = new_library();
        std::fs::create_dir_all(&library.library_root).unwrap();
        let t0 = Utc::now();
        let skill = Skill::new("versioned", SkillCategory::Creation, "original body", t0);
        let path = library.library_root.join("versioned.md");
        std::fs::write(&path, frontmatter::render(&skill, None).unwrap()).unwrap();
        library.load_all().unwrap();

        let updated = library
            .create_version(
                "versioned",
                "revised body",
                "tightened the hook after three low-engagement runs",
                t0 + chrono::Duration::days(1),
            )
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.content, "revised body");

        let rewritten = std::fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("change_reason"));
        assert!(rewritten.contains("tightened the hook after three low-engagement runs"));

        let archived: Vec<_> = std::fs::read_dir(&library.versions_dir).unwrap().collect();
        assert_eq!(archived.len(), 1);
        let archived_body = std::fs::read_to_string(archived[0].as_ref().unwrap().path()).unwrap();
        assert!(archived_body.contains("original body"));
        assert!(!archived_body.contains("change_reason"));
    }
}
