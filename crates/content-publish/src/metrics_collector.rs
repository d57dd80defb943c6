use chrono::{DateTime, Utc};

use content_core::types::{Metric, MetricInterval, SkillOutcome};
use content_core::CoreResult;
use content_skills::OutcomeBus;
use content_store::Store;

use crate::publisher::PublisherRegistry;

/// Minimum count of newly written skill outcomes in one tick that makes the
/// collector flag an out-of-cycle FeedbackLoop trigger (§4.8).
pub const FEEDBACK_TRIGGER_THRESHOLD: usize = 3;

fn engagement_to_score(rate: f64) -> f64 {
    if rate >= 0.05 {
        0.8 + ((rate - 0.05) * 4.0).min(0.2)
    } else if rate >= 0.03 {
        0.6 + (rate - 0.03) * 10.0
    } else if rate >= 0.01 {
        0.3 + (rate - 0.01) * 15.0
    } else {
        (rate * 30.0).max(0.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricsReport {
    pub collected: usize,
    pub skills_updated: usize,
    pub errors: usize,
}

impl MetricsReport {
    pub fn should_trigger_feedback(&self) -> bool {
        self.skills_updated >= FEEDBACK_TRIGGER_THRESHOLD
    }
}

/// Pulls engagement snapshots for every publication at each interval offset
/// once it's due, and folds 24h engagement into skill confidence via the
/// piecewise engagement-to-score map (§4.8).
pub struct MetricsCollector<'a> {
    store: &'a Store,
    skills: &'a content_skills::SkillLibrary,
    registry: &'a PublisherRegistry,
}

impl<'a> MetricsCollector<'a> {
    pub fn new(store: &'a Store, skills: &'a content_skills::SkillLibrary, registry: &'a PublisherRegistry) -> Self {
        Self { store, skills, registry }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> CoreResult<MetricsReport> {
        let mut report = MetricsReport::default();

        for publication in self.store.all_publications()? {
            for interval in MetricInterval::ALL {
                let due_at = publication.published_at + interval.offset();
                if now < due_at {
                    continue;
                }
                if self.store.metric_exists(publication.id, interval)? {
                    continue;
                }

                let Some(publisher) = self.registry.for_platform(&publication.platform) else {
                    tracing::warn!(platform = %publication.platform, "no publisher registered for metrics pull");
                    report.errors += 1;
                    continue;
                };

                match publisher.get_metrics(&publication.platform_post_id).await {
                    Ok(snapshot) => {
                        self.store.insert_metric(Metric {
                            id: 0,
                            publication_id: publication.id,
                            interval,
                            snapshot,
                            collected_at: now,
                        })?;
                        report.collected += 1;

                        if interval == MetricInterval::H24 {
                            let updated = self.apply_skill_feedback(&publication, snapshot, now)?;
                            report.skills_updated += updated;
                        }
                    }
                    Err(err) => {
                        tracing::error!(publication_id = publication.id, interval = interval.label(), error = %err, "metrics collection failed");
                        report.errors += 1;
                    }
                }
            }
        }

        tracing::info!(
            collected = report.collected,
            skills_updated = report.skills_updated,
            errors = report.errors,
            "metrics collector complete"
        );
        Ok(report)
    }

    fn apply_skill_feedback(
        &self,
        publication: &content_core::types::Publication,
        snapshot: content_core::types::EngagementSnapshot,
        now: DateTime<Utc>,
    ) -> CoreResult<usize> {
        let Some(creation) = self.store.get_creation(publication.creation_id)? else {
            return Ok(0);
        };
        if creation.skills_used.is_empty() {
            return Ok(0);
        }

        let score = engagement_to_score(snapshot.engagement_rate);
        let outcome = SkillOutcome::from_score(score);
        let bus = OutcomeBus::new(self.skills);
        let mut updated = 0;

        for skill_name in &creation.skills_used {
            bus.record(
                skill_name,
                "metrics_collector",
                "engagement_feedback",
                outcome,
                score,
                serde_json::json!({
                    "publication_id": publication.id,
                    "creation_id": creation.id,
                    "platform": publication.platform,
                    "engagement_rate": snapshot.engagement_rate,
                    "views": snapshot.views,
                    "likes": snapshot.likes,
                    "comments": snapshot.comments,
                    "shares": snapshot.shares,
                }),
                now,
            )?;
            updated += 1;
            tracing::info!(skill = %skill_name, score, engagement_rate = snapshot.engagement_rate, "skill outcome updated from engagement");
        }

        if creation.skills_used.len() > 1 {
            for i in 0..creation.skills_used.len() {
                for j in (i + 1)..creation.skills_used.len() {
                    self.store
                        .record_skill_interaction(&creation.skills_used[i], &creation.skills_used[j], score, now)?;
                }
            }
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engagement_mapping_matches_piecewise_breakpoints() {
        assert!((engagement_to_score(0.0) - 0.0).abs() < 1e-9);
        assert!((engagement_to_score(0.01) - 0.3).abs() < 1e-9);
        assert!((engagement_to_score(0.03) - 0.6).abs() < 1e-9);
        assert!((engagement_to_score(0.05) - 0.8).abs() < 1e-9);
        assert!((engagement_to_score(0.10) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn low_engagement_is_failure_bucket() {
        assert_eq!(SkillOutcome::from_score(engagement_to_score(0.002)), SkillOutcome::Failure);
    }
}
