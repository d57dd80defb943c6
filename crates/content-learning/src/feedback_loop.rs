use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use content_core::types::ExperimentStatus;
use content_core::CoreResult;
use content_skills::{SkillEvaluator, SkillLibrary, SkillSynthesizer};
use content_store::Store;

use crate::experiment_runner::ExperimentRunner;
use crate::failure_patterns::FailurePatternTracker;
use crate::pattern_analyzer::PatternAnalyzer;

const FAILURE_LOOKBACK_DAYS: i64 = 14;

#[derive(Debug, Clone, Default)]
pub struct CycleSummary {
    pub patterns_found: usize,
    pub confidence_updates: usize,
    pub stale_skills: Vec<String>,
    pub synthesizer_patterns: usize,
    pub synthesizer_proposals: usize,
    pub failures_analyzed: usize,
    pub failure_pattern_categories: BTreeMap<String, usize>,
    pub experiments_checked: usize,
    pub variants_promoted: usize,
}

/// Ties pattern analysis, experiments, and skill maintenance together into
/// one periodic (and opportunistically-triggered) cycle (§4.9).
pub struct FeedbackLoop<'a> {
    store: &'a Store,
    skills: &'a SkillLibrary,
    failure_tracker: &'a FailurePatternTracker,
    evaluator: SkillEvaluator,
    synthesizer: SkillSynthesizer,
}

impl<'a> FeedbackLoop<'a> {
    pub fn new(store: &'a Store, skills: &'a SkillLibrary, failure_tracker: &'a FailurePatternTracker) -> Self {
        Self {
            store,
            skills,
            failure_tracker,
            evaluator: SkillEvaluator::new(),
            synthesizer: SkillSynthesizer::new(),
        }
    }

    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CoreResult<CycleSummary> {
        let mut summary = CycleSummary::default();

        // Step 1 — canonical pattern analysis.
        let patterns = PatternAnalyzer::new().analyze(self.store)?;
        summary.patterns_found = patterns.len();

        // Step 2 — recompute confidence from persisted metrics.
        summary.confidence_updates = self.recompute_confidence(now)?;

        // Step 3 — staleness sweep.
        for skill in self.skills.all_skills() {
            if self.evaluator.detect_staleness(&skill, now) && skill.status != content_core::types::SkillStatus::Stale {
                self.skills.mark_stale(&skill.name, now)?;
                summary.stale_skills.push(skill.name);
            }
        }

        // Step 4 (supplemented, §10.2) — synthesizer proposals, informational only.
        let all_metrics = self.store.all_skill_metrics()?;
        let synth_patterns = self.synthesizer.analyze_patterns(&all_metrics);
        summary.synthesizer_patterns = synth_patterns.len();
        let mut by_skill: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for metric in &all_metrics {
            by_skill.entry(metric.skill_name.as_str()).or_default().push(metric.score);
        }
        for pattern in &synth_patterns {
            let Some(skill) = self.skills.get_skill(&pattern.skill_name) else { continue };
            let scores = by_skill.get(pattern.skill_name.as_str()).cloned().unwrap_or_default();
            if let Some(proposal) = self.synthesizer.propose_updates(&skill, &scores, &[], now) {
                summary.synthesizer_proposals += 1;
                tracing::info!(
                    skill = %proposal.skill_name,
                    action = ?proposal.action,
                    reason = %proposal.reason,
                    "skill revision proposal"
                );
            }
        }

        // Step 4 (spec numbering) — failure-pattern extraction, feeds Creator's avoid-guidance cache.
        let failure_report = self.failure_tracker.analyze_failures(self.store, now, FAILURE_LOOKBACK_DAYS)?;
        summary.failures_analyzed = failure_report.failure_count;
        summary.failure_pattern_categories = failure_report.patterns_by_category;

        // Step 5 — experiment sweep.
        let runner = ExperimentRunner::new(self.store);
        for experiment in self.store.experiments_by_status(ExperimentStatus::Running)? {
            summary.experiments_checked += 1;
            let outcome = runner.check_winner(experiment.id, now)?;
            if !outcome.complete {
                continue;
            }
            if outcome.winner == Some(content_core::types::ExperimentWinner::B) {
                self.skills.create_version(
                    &experiment.skill_name,
                    &experiment.variant_b_description,
                    &format!("experiment winner (confidence {:.2})", outcome.confidence),
                    now,
                )?;
                summary.variants_promoted += 1;
                tracing::info!(skill = %experiment.skill_name, "promoted experiment-winning variant");
            }
        }

        tracing::info!(
            patterns = summary.patterns_found,
            confidence_updates = summary.confidence_updates,
            stale = summary.stale_skills.len(),
            proposals = summary.synthesizer_proposals,
            failures = summary.failures_analyzed,
            experiments = summary.experiments_checked,
            promoted = summary.variants_promoted,
            "feedback cycle complete"
        );

        Ok(summary)
    }

    fn recompute_confidence(&self, now: DateTime<Utc>) -> CoreResult<usize> {
        let mut by_skill: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for metric in self.store.all_skill_metrics()? {
            by_skill.entry(metric.skill_name).or_default().push(metric.score);
        }

        let mut updated = 0;
        for (skill_name, scores) in by_skill {
            if self.skills.get_skill(&skill_name).is_none() {
                continue;
            }
            let mean = scores.iter().sum::<f64>() / scores.len() as f64;
            self.skills.recompute_confidence(&skill_name, mean, now)?;
            updated += 1;
        }
        Ok(updated)
    }
}
