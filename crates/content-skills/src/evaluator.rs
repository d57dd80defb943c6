use chrono::{DateTime, Utc};
use content_core::types::Skill;

const STALE_THRESHOLD_DAYS: i64 = 7;
const WARNING_CONFIDENCE: f64 = 0.3;
const CRITICAL_CONFIDENCE: f64 = 0.15;
const WARNING_FAILURE_STREAK: u32 = 3;
const CRITICAL_FAILURE_STREAK: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Improving,
    Degrading,
    Stable,
}

/// Assesses skill health, staleness, and performance trends. Stateless —
/// every method takes the skill (and, for trends, its recent outcome
/// history) as input.
#[derive(Default)]
pub struct SkillEvaluator;

impl SkillEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn check_health(&self, skill: &Skill, now: DateTime<Utc>) -> HealthReport {
        let mut reasons = Vec::new();
        let mut status = HealthStatus::Healthy;

        if skill.confidence < CRITICAL_CONFIDENCE {
            reasons.push(format!(
                "confidence critically low ({:.2} < {CRITICAL_CONFIDENCE})",
                skill.confidence
            ));
            status = HealthStatus::Critical;
        }
        if skill.failure_streak > CRITICAL_FAILURE_STREAK {
            reasons.push(format!(
                "failure streak critically high ({} > {CRITICAL_FAILURE_STREAK})",
                skill.failure_streak
            ));
            status = HealthStatus::Critical;
        }

        if status != HealthStatus::Critical {
            if skill.confidence < WARNING_CONFIDENCE {
                reasons.push(format!("confidence low ({:.2} < {WARNING_CONFIDENCE})", skill.confidence));
                status = HealthStatus::Warning;
            }
            if skill.failure_streak > WARNING_FAILURE_STREAK {
                reasons.push(format!(
                    "failure streak high ({} > {WARNING_FAILURE_STREAK})",
                    skill.failure_streak
                ));
                status = HealthStatus::Warning;
            }
            if self.not_validated_recently(skill, now) {
                reasons.push(format!("not validated in the last {STALE_THRESHOLD_DAYS} days"));
                if status == HealthStatus::Healthy {
                    status = HealthStatus::Warning;
                }
            }
        }

        HealthReport { status, reasons }
    }

    pub fn detect_staleness(&self, skill: &Skill, now: DateTime<Utc>) -> bool {
        if skill.last_validated_at.is_none() {
            return true;
        }
        if self.not_validated_recently(skill, now) {
            return true;
        }
        skill.confidence < 0.2
    }

    /// Compares the mean of the last 5 recorded scores against the previous
    /// 5. `recent_outcomes` must already be in chronological order.
    pub fn compute_trend(&self, recent_outcomes: &[f64]) -> Trend {
        if recent_outcomes.len() < 2 {
            return Trend::Stable;
        }
        let last_5 = &recent_outcomes[recent_outcomes.len().saturating_sub(5)..];
        let previous_5 = if recent_outcomes.len() > 5 {
            let end = recent_outcomes.len() - 5;
            let start = end.saturating_sub(5);
            &recent_outcomes[start..end]
        } else {
            &[][..]
        };
        if previous_5.is_empty() {
            return Trend::Stable;
        }
        let last_avg = last_5.iter().sum::<f64>() / last_5.len() as f64;
        let prev_avg = previous_5.iter().sum::<f64>() / previous_5.len() as f64;
        if last_avg > prev_avg {
            Trend::Improving
        } else if last_avg < prev_avg {
            Trend::Degrading
        } else {
            Trend::Stable
        }
    }

    fn not_validated_recently(&self, skill: &Skill, now: DateTime<Utc>) -> bool {
        match skill.last_validated_at {
            None => true,
            Some(last) => (now - last) > chrono::Duration::days(STALE_THRESHOLD_DAYS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_core::types::SkillCategory;

    #[test]
    fn critical_overrides_warning() {
        let evaluator = SkillEvaluator::new();
        let now = Utc::now();
        let mut skill = Skill::new("s", SkillCategory::Tools, "", now);
        skill.confidence = 0.10;
        skill.failure_streak = 1;
        let report = evaluator.check_health(&skill, now);
        assert_eq!(report.status, HealthStatus::Critical);
    }

    #[test]
    fn trend_needs_six_points() {
        let evaluator = SkillEvaluator::new();
        assert_eq!(evaluator.compute_trend(&[0.5, 0.5, 0.5, 0.5, 0.5]), Trend::Stable);
        let improving = vec![0.1, 0.1, 0.1, 0.1, 0.1, 0.9, 0.9, 0.9, 0.9, 0.9];
        assert_eq!(evaluator.compute_trend(&improving), Trend::Improving);
    }
}
