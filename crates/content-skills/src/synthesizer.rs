use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use content_core::types::{Skill, SkillMetric};

#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    HighPerformer,
    Underperformer,
    TrendShift { direction: TrendDirection, delta: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Improving,
    Declining,
}

#[derive(Debug, Clone)]
pub struct SkillPattern {
    pub kind: PatternKind,
    pub skill_name: String,
    pub avg_score: f64,
    pub sample_size: usize,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalAction {
    MajorRevision,
    TargetedUpdate,
    MinorRefinement,
}

#[derive(Debug, Clone)]
pub struct SkillProposal {
    pub skill_name: String,
    pub current_version: u32,
    pub proposed_at: DateTime<Utc>,
    pub avg_score: f64,
    pub sample_size: usize,
    pub action: ProposalAction,
    pub reason: String,
    pub suggested_changes: Vec<String>,
}

/// Finds correlations between skill usage and outcomes, and drafts skill
/// content/updates when a pattern is strong enough to act on. Distinct from
/// `content-learning`'s `PatternAnalyzer`, which aggregates the same
/// `SkillMetric` rows with different thresholds for the feedback loop's own
/// strategic reporting.
#[derive(Default)]
pub struct SkillSynthesizer;

impl SkillSynthesizer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze_patterns(&self, metrics: &[SkillMetric]) -> Vec<SkillPattern> {
        if metrics.is_empty() {
            return Vec::new();
        }

        let mut by_skill: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for m in metrics {
            by_skill.entry(m.skill_name.as_str()).or_default().push(m.score);
        }

        let mut patterns = Vec::new();
        for (name, scores) in by_skill {
            if scores.is_empty() {
                continue;
            }
            let avg = scores.iter().sum::<f64>() / scores.len() as f64;

            if avg >= 0.8 && scores.len() >= 3 {
                patterns.push(SkillPattern {
                    kind: PatternKind::HighPerformer,
                    skill_name: name.to_string(),
                    avg_score: avg,
                    sample_size: scores.len(),
                    description: format!(
                        "skill '{name}' consistently performs well (avg {avg:.2} over {} uses)",
                        scores.len()
                    ),
                });
            } else if avg <= 0.3 && scores.len() >= 3 {
                patterns.push(SkillPattern {
                    kind: PatternKind::Underperformer,
                    skill_name: name.to_string(),
                    avg_score: avg,
                    sample_size: scores.len(),
                    description: format!(
                        "skill '{name}' consistently underperforms (avg {avg:.2} over {} uses)",
                        scores.len()
                    ),
                });
            }

            if scores.len() >= 6 {
                let mid = scores.len() / 2;
                let first_avg = scores[..mid].iter().sum::<f64>() / mid as f64;
                let second_avg = scores[mid..].iter().sum::<f64>() / (scores.len() - mid) as f64;
                let delta = second_avg - first_avg;
                if delta.abs() > 0.15 {
                    let direction = if delta > 0.0 {
                        TrendDirection::Improving
                    } else {
                        TrendDirection::Declining
                    };
                    let label = if delta > 0.0 { "improving" } else { "declining" };
                    patterns.push(SkillPattern {
                        kind: PatternKind::TrendShift { direction, delta },
                        skill_name: name.to_string(),
                        avg_score: avg,
                        sample_size: scores.len(),
                        description: format!("skill '{name}' is {label} (delta {delta:+.2})"),
                    });
                }
            }
        }
        patterns
    }

    /// Drafts new skill markdown from a pattern, picking a free name by
    /// appending a counter if `derived-from-<skill>` is already taken.
    pub fn generate_skill(&self, pattern: &SkillPattern, existing: &[Skill]) -> String {
        let existing_names: std::collections::HashSet<&str> = existing.iter().map(|s| s.name.as_str()).collect();
        let base_name = format!("derived-from-{}", pattern.skill_name);
        let mut new_name = base_name.clone();
        let mut counter = 2;
        while existing_names.contains(new_name.as_str()) {
            new_name = format!("{base_name}-{counter}");
            counter += 1;
        }

        format!(
            "# {new_name}\n\nDerived from pattern: {}\n\n## Context\n\n- Source skill: {}\n- Average score: {:.3}\n- Sample size: {}\n\n## Guidelines\n\n<!-- replace with specific guidelines once validated -->\n\n1. Apply the successful patterns observed in the source skill.\n2. Monitor performance closely during the first 10 uses.\n3. Validate against real outcomes before promoting to active.\n",
            pattern.description, pattern.skill_name, pattern.avg_score, pattern.sample_size
        )
    }

    /// Proposes a content revision when outcomes show a clear signal —
    /// either a strong average or any qualitative feedback attached.
    pub fn propose_updates(&self, skill: &Skill, scores: &[f64], feedbacks: &[String], at: DateTime<Utc>) -> Option<SkillProposal> {
        if scores.len() < 3 {
            return None;
        }
        let avg = scores.iter().sum::<f64>() / scores.len() as f64;
        if (0.3..=0.7).contains(&avg) && feedbacks.is_empty() {
            return None;
        }

        let (action, reason, suggested_changes) = if avg < 0.3 {
            (
                ProposalAction::MajorRevision,
                format!("consistently low scores (avg {avg:.2} over {} outcomes)", scores.len()),
                vec![
                    "review core assumptions in skill content".to_string(),
                    "cross-reference with high-performing skills in the same category".to_string(),
                    "consider retiring if no improvement path is clear".to_string(),
                ],
            )
        } else if avg >= 0.8 {
            (
                ProposalAction::MinorRefinement,
                format!("strong performance (avg {avg:.2}); refine to capture what works"),
                vec![
                    "document the specific conditions where this skill excels".to_string(),
                    "tighten guidelines to codify successful patterns".to_string(),
                ],
            )
        } else {
            (
                ProposalAction::TargetedUpdate,
                format!("mixed results (avg {avg:.2}); targeted improvements needed"),
                vec![
                    "identify which contexts produce good vs poor results".to_string(),
                    "add conditional guidance for different scenarios".to_string(),
                ],
            )
        };

        Some(SkillProposal {
            skill_name: skill.name.clone(),
            current_version: skill.version,
            proposed_at: at,
            avg_score: avg,
            sample_size: scores.len(),
            action,
            reason,
            suggested_changes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(skill_name: &str, score: f64) -> SkillMetric {
        SkillMetric {
            id: 0,
            skill_name: skill_name.to_string(),
            agent: "creator".into(),
            task: "content_creation".into(),
            outcome: content_core::types::SkillOutcome::from_score(score),
            score,
            context: serde_json::json!({}),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn flags_high_performer_at_three_samples() {
        let synthesizer = SkillSynthesizer::new();
        let metrics = vec![metric("a", 0.9), metric("a", 0.85), metric("a", 0.95)];
        let patterns = synthesizer.analyze_patterns(&metrics);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].kind, PatternKind::HighPerformer);
    }

    #[test]
    fn no_proposal_for_small_sample() {
        let synthesizer = SkillSynthesizer::new();
        let now = Utc::now();
        let skill = Skill::new("s", content_core::types::SkillCategory::Creation, "", now);
        assert!(synthesizer.propose_updates(&skill, &[0.5, 0.6], &[], now).is_none());
    }
}
