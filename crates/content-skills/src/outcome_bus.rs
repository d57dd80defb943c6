use chrono::{DateTime, Utc};
use content_core::types::{SkillMetric, SkillOutcome};
use content_core::CoreResult;

use crate::library::SkillLibrary;

/// Single entry point for recording a skill's per-use outcome: writes the
/// append-only `SkillMetric` row and drives the confidence update through
/// `SkillLibrary`. Every producer (Creator, MetricsCollector, FeedbackLoop)
/// goes through this instead of touching the library or the store directly,
/// which is what keeps confidence updates for one skill totally ordered.
pub struct OutcomeBus<'a> {
    library: &'a SkillLibrary,
}

impl<'a> OutcomeBus<'a> {
    pub fn new(library: &'a SkillLibrary) -> Self {
        Self { library }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        skill_name: &str,
        agent: &str,
        task: &str,
        outcome: SkillOutcome,
        score: f64,
        context: serde_json::Value,
        at: DateTime<Utc>,
    ) -> CoreResult<()> {
        let id = self.library.store().insert_skill_metric(SkillMetric {
            id: 0,
            skill_name: skill_name.to_string(),
            agent: agent.to_string(),
            task: task.to_string(),
            outcome,
            score,
            context,
            recorded_at: at,
        })?;
        tracing::debug!(skill = skill_name, metric_id = id, score, "recorded skill outcome");
        self.library.record_outcome(skill_name, outcome, score, at)?;
        Ok(())
    }
}
