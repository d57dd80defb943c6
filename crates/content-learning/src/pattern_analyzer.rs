use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use content_core::types::MetricInterval;
use content_core::CoreResult;
use content_store::Store;

const HIGH_PERFORMER_AVG: f64 = 0.7;
const HIGH_PERFORMER_N: usize = 5;
const UNDERPERFORMER_AVG: f64 = 0.3;
const UNDERPERFORMER_N: usize = 5;
const TREND_N: usize = 6;
const TREND_DELTA: f64 = 0.15;
const ENGAGEMENT_CORRELATION_AVG: f64 = 0.6;
const ENGAGEMENT_CORRELATION_N: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Improving,
    Declining,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    HighPerformer,
    Underperformer,
    TrendShift { direction: TrendDirection, delta: f64 },
    EngagementCorrelation,
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub kind: PatternKind,
    pub skill_name: String,
    pub avg_score: f64,
    pub sample_size: usize,
    pub description: String,
}

/// Canonical pattern-analysis pass feeding `FeedbackLoop` step 1 (§10.3).
/// Distinct from `content_skills::SkillSynthesizer::analyze_patterns`, which
/// looks at the same `SkillMetric` history with looser thresholds for a
/// different purpose (skill-revision proposals).
#[derive(Default)]
pub struct PatternAnalyzer;

impl PatternAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, store: &Store) -> CoreResult<Vec<Pattern>> {
        let mut patterns = Vec::new();
        patterns.extend(self.score_based_patterns(store)?);
        patterns.extend(self.engagement_correlation_patterns(store)?);
        Ok(patterns)
    }

    fn score_based_patterns(&self, store: &Store) -> CoreResult<Vec<Pattern>> {
        let mut by_skill: BTreeMap<String, Vec<(DateTime<Utc>, f64)>> = BTreeMap::new();
        for metric in store.all_skill_metrics()? {
            by_skill
                .entry(metric.skill_name)
                .or_default()
                .push((metric.recorded_at, metric.score));
        }

        let mut patterns = Vec::new();
        for (name, mut rows) in by_skill {
            rows.sort_by_key(|(at, _)| *at);
            let scores: Vec<f64> = rows.iter().map(|(_, s)| *s).collect();
            let n = scores.len();
            if n == 0 {
                continue;
            }
            let avg = scores.iter().sum::<f64>() / n as f64;

            if avg >= HIGH_PERFORMER_AVG && n >= HIGH_PERFORMER_N {
                patterns.push(Pattern {
                    kind: PatternKind::HighPerformer,
                    skill_name: name.clone(),
                    avg_score: avg,
                    sample_size: n,
                    description: format!("skill '{name}' is a high performer (avg {avg:.2} over {n} uses)"),
                });
            } else if avg <= UNDERPERFORMER_AVG && n >= UNDERPERFORMER_N {
                patterns.push(Pattern {
                    kind: PatternKind::Underperformer,
                    skill_name: name.clone(),
                    avg_score: avg,
                    sample_size: n,
                    description: format!("skill '{name}' is an underperformer (avg {avg:.2} over {n} uses)"),
                });
            }

            if n >= TREND_N {
                let mid = n / 2;
                let first_avg = scores[..mid].iter().sum::<f64>() / mid as f64;
                let second_avg = scores[mid..].iter().sum::<f64>() / (n - mid) as f64;
                let delta = second_avg - first_avg;
                if delta.abs() > TREND_DELTA {
                    let direction = if delta > 0.0 { TrendDirection::Improving } else { TrendDirection::Declining };
                    let label = if delta > 0.0 { "improving" } else { "declining" };
                    patterns.push(Pattern {
                        kind: PatternKind::TrendShift { direction, delta },
                        skill_name: name.clone(),
                        avg_score: avg,
                        sample_size: n,
                        description: format!("skill '{name}' trend is {label} (delta {delta:+.2})"),
                    });
                }
            }
        }
        Ok(patterns)
    }

    /// Correlates each skill against the engagement rate of the creations
    /// that used it, not just the raw `SkillMetric.score`.
    fn engagement_correlation_patterns(&self, store: &Store) -> CoreResult<Vec<Pattern>> {
        let publications = store.all_publications()?;
        let mut publication_by_creation = BTreeMap::new();
        for publication in &publications {
            publication_by_creation.insert(publication.creation_id, publication);
        }

        let mut by_skill: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for creation in store.all_creations()? {
            if creation.skills_used.is_empty() {
                continue;
            }
            let Some(publication) = publication_by_creation.get(&creation.id) else {
                continue;
            };
            let metrics = store.metrics_by_publication(publication.id)?;
            let Some(h24) = metrics.into_iter().find(|m| m.interval == MetricInterval::H24) else {
                continue;
            };
            for skill_name in &creation.skills_used {
                by_skill.entry(skill_name.clone()).or_default().push(h24.snapshot.engagement_rate);
            }
        }

        let mut patterns = Vec::new();
        for (name, rates) in by_skill {
            let n = rates.len();
            if n < ENGAGEMENT_CORRELATION_N {
                continue;
            }
            let avg = rates.iter().sum::<f64>() / n as f64;
            if avg >= ENGAGEMENT_CORRELATION_AVG {
                patterns.push(Pattern {
                    kind: PatternKind::EngagementCorrelation,
                    skill_name: name.clone(),
                    avg_score: avg,
                    sample_size: n,
                    description: format!(
                        "skill '{name}' correlates with strong engagement (avg rate {avg:.2} over {n} publications)"
                    ),
                });
            }
        }
        Ok(patterns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_core::types::{SkillMetric, SkillOutcome};

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (dir, store)
    }

    fn metric(skill_name: &str, score: f64, at: DateTime<Utc>) -> SkillMetric {
        SkillMetric {
            id: 0,
            skill_name: skill_name.to_string(),
            agent: "creator".into(),
            task: "content_creation".into(),
            outcome: SkillOutcome::from_score(score),
            score,
            context: serde_json::json!({}),
            recorded_at: at,
        }
    }

    #[test]
    fn needs_five_samples_not_three_for_high_performer() {
        let (_dir, store) = store();
        let now = Utc::now();
        for _ in 0..3 {
            store.insert_skill_metric(metric("writer", 0.9, now)).unwrap();
        }
        let patterns = PatternAnalyzer::new().analyze(&store).unwrap();
        assert!(patterns.is_empty());
    }

    #[test]
    fn flags_high_performer_at_five_samples() {
        let (_dir, store) = store();
        let now = Utc::now();
        for _ in 0..5 {
            store.insert_skill_metric(metric("writer", 0.9, now)).unwrap();
        }
        let patterns = PatternAnalyzer::new().analyze(&store).unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].kind, PatternKind::HighPerformer);
    }

    #[test]
    fn trend_shift_uses_second_vs_first_half() {
        let (_dir, store) = store();
        let base = Utc::now();
        let scores = [0.1, 0.1, 0.1, 0.9, 0.9, 0.9];
        for (i, score) in scores.iter().enumerate() {
            store
                .insert_skill_metric(metric("hook", *score, base + chrono::Duration::minutes(i as i64)))
                .unwrap();
        }
        let patterns = PatternAnalyzer::new().analyze(&store).unwrap();
        assert!(patterns.iter().any(|p| matches!(p.kind, PatternKind::TrendShift { direction: TrendDirection::Improving, .. })));
    }
}
