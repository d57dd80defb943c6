use chrono::{DateTime, Utc};

use content_core::types::{Experiment, ExperimentStatus, ExperimentWinner, MetricInterval};
use content_core::{CoreError, CoreResult};
use content_store::Store;

const MIN_SAMPLES: usize = 10;
const P_THRESHOLD: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct WinnerOutcome {
    pub winner: Option<ExperimentWinner>,
    pub confidence: f64,
    pub p_value: f64,
    pub effect_size: f64,
    pub complete: bool,
    pub method: &'static str,
    pub mean_a: f64,
    pub mean_b: f64,
    pub samples_a: usize,
    pub samples_b: usize,
}

/// Registers A/B candidates, folds in individual 24h engagement
/// observations as they arrive, and runs the two-sample significance test
/// that decides a winner (§4.10).
pub struct ExperimentRunner<'a> {
    store: &'a Store,
}

impl<'a> ExperimentRunner<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn create_experiment(
        &self,
        skill_name: impl Into<String>,
        variant_b_description: impl Into<String>,
        metric_target: impl Into<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<u64> {
        self.store.insert_experiment(Experiment {
            id: 0,
            skill_name: skill_name.into(),
            variant_a_description: "original".to_string(),
            variant_b_description: variant_b_description.into(),
            metric_target: metric_target.into(),
            variant_a_score: 0.0,
            variant_b_score: 0.0,
            sample_size_a: 0,
            sample_size_b: 0,
            winner: None,
            status: ExperimentStatus::Running,
            started_at: now,
            completed_at: None,
        })
    }

    /// Running-mean update for one observation of one arm (§4.10, §10.1 share
    /// the same update rule).
    pub fn record_result(&self, experiment_id: u64, variant: &str, score: f64) -> CoreResult<()> {
        self.store.mutate_experiment(experiment_id, |experiment| match variant {
            "A" | "a" => {
                let n = experiment.sample_size_a as f64;
                experiment.variant_a_score = ((experiment.variant_a_score * n + score) / (n + 1.0) * 10000.0).round() / 10000.0;
                experiment.sample_size_a += 1;
            }
            "B" | "b" => {
                let n = experiment.sample_size_b as f64;
                experiment.variant_b_score = ((experiment.variant_b_score * n + score) / (n + 1.0) * 10000.0).round() / 10000.0;
                experiment.sample_size_b += 1;
            }
            _ => tracing::warn!(variant, experiment_id, "unknown experiment variant, ignoring"),
        })?;
        Ok(())
    }

    pub fn check_winner(&self, experiment_id: u64, now: DateTime<Utc>) -> CoreResult<WinnerOutcome> {
        let experiment = self
            .store
            .get_experiment(experiment_id)?
            .ok_or_else(|| CoreError::NotFound(format!("experiment {experiment_id}")))?;

        let (observations_a, observations_b) = self.variant_observations(&experiment)?;
        let (n_a, n_b) = (observations_a.len(), observations_b.len());

        if n_a < MIN_SAMPLES || n_b < MIN_SAMPLES {
            return Ok(WinnerOutcome {
                winner: None,
                confidence: 0.0,
                p_value: 1.0,
                effect_size: 0.0,
                complete: false,
                method: "insufficient_data",
                mean_a: 0.0,
                mean_b: 0.0,
                samples_a: n_a,
                samples_b: n_b,
            });
        }

        let mean_a = observations_a.iter().sum::<f64>() / n_a as f64;
        let mean_b = observations_b.iter().sum::<f64>() / n_b as f64;
        let (p_value, effect_size) = welch_t_test(&observations_a, &observations_b);

        let winner = if p_value > P_THRESHOLD {
            None
        } else if mean_a > mean_b {
            Some(ExperimentWinner::A)
        } else {
            Some(ExperimentWinner::B)
        };

        self.store.mutate_experiment(experiment_id, |experiment| {
            experiment.status = ExperimentStatus::Completed;
            experiment.winner = Some(winner.unwrap_or(ExperimentWinner::None));
            experiment.variant_a_score = mean_a;
            experiment.variant_b_score = mean_b;
            experiment.sample_size_a = n_a as u32;
            experiment.sample_size_b = n_b as u32;
            experiment.completed_at = Some(now);
        })?;

        tracing::info!(
            experiment_id,
            ?winner,
            p_value,
            effect_size,
            "experiment evaluated"
        );

        Ok(WinnerOutcome {
            winner,
            confidence: 1.0 - p_value,
            p_value,
            effect_size,
            complete: true,
            method: "welch_t_approx",
            mean_a,
            mean_b,
            samples_a: n_a,
            samples_b: n_b,
        })
    }

    /// Pulls per-observation engagement rates for variant A and B: creations
    /// carrying the experiment's skill in `skills_used`, tagged with that
    /// variant's label, whose publication has a 24h metric, created since
    /// the experiment started.
    fn variant_observations(&self, experiment: &Experiment) -> CoreResult<(Vec<f64>, Vec<f64>)> {
        let publications = self.store.all_publications()?;
        let mut publication_by_creation = std::collections::BTreeMap::new();
        for publication in &publications {
            publication_by_creation.insert(publication.creation_id, publication);
        }

        let mut observations_a = Vec::new();
        let mut observations_b = Vec::new();

        for creation in self.store.all_creations()? {
            if creation.created_at < experiment.started_at {
                continue;
            }
            if !creation.skills_used.iter().any(|s| s == &experiment.skill_name) {
                continue;
            }
            let Some(publication) = publication_by_creation.get(&creation.id) else {
                continue;
            };
            let metrics = self.store.metrics_by_publication(publication.id)?;
            let Some(h24) = metrics.into_iter().find(|m| m.interval == MetricInterval::H24) else {
                continue;
            };

            match creation.variant_label.as_deref() {
                Some("A") => observations_a.push(h24.snapshot.engagement_rate),
                Some("B") => observations_b.push(h24.snapshot.engagement_rate),
                _ => {}
            }
        }

        Ok((observations_a, observations_b))
    }
}

/// Welch's t-test approximation with the Abramowitz-Stegun normal-CDF,
/// the core's always-available fallback when no heavier statistics backend
/// is linked in (§4.10).
fn welch_t_test(a: &[f64], b: &[f64]) -> (f64, f64) {
    let n1 = a.len() as f64;
    let n2 = b.len() as f64;
    let mean1 = a.iter().sum::<f64>() / n1;
    let mean2 = b.iter().sum::<f64>() / n2;

    let var1 = if n1 > 1.0 {
        a.iter().map(|x| (x - mean1).powi(2)).sum::<f64>() / (n1 - 1.0)
    } else {
        0.0
    };
    let var2 = if n2 > 1.0 {
        b.iter().map(|x| (x - mean2).powi(2)).sum::<f64>() / (n2 - 1.0)
    } else {
        0.0
    };

    let se_sq = var1 / n1 + var2 / n2;
    let se = if se_sq > 0.0 { se_sq.sqrt() } else { 0.001 };
    let t_stat = if se > 0.0 { (mean1 - mean2) / se } else { 0.0 };

    let p_value = 2.0 * (1.0 - normal_cdf(t_stat.abs()));
    let p_value = p_value.clamp(0.0001, 1.0);

    let pooled_n = n1 + n2 - 2.0;
    let pooled_std = if pooled_n > 0.0 {
        (((n1 - 1.0) * var1 + (n2 - 1.0) * var2) / pooled_n).sqrt()
    } else {
        1.0
    };
    let effect_size = if pooled_std > 0.0 { (mean1 - mean2).abs() / pooled_std } else { 0.0 };

    (p_value, effect_size)
}

/// Abramowitz and Stegun normal-CDF approximation (formula 26.2.17).
fn normal_cdf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x >= 0.0 { 1.0 } else { -1.0 };
    let x = x.abs() / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    0.5 * (1.0 + sign * y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_cdf_matches_known_points() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-3);
        assert!(normal_cdf(3.0) > 0.998);
        assert!(normal_cdf(-3.0) < 0.002);
    }

    #[test]
    fn record_result_computes_running_mean() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let runner = ExperimentRunner::new(&store);
        let id = runner.create_experiment("hook-writer", "shorter hooks", "engagement_rate", Utc::now()).unwrap();

        runner.record_result(id, "A", 0.02).unwrap();
        runner.record_result(id, "A", 0.04).unwrap();
        let experiment = store.get_experiment(id).unwrap().unwrap();
        assert!((experiment.variant_a_score - 0.03).abs() < 1e-6);
        assert_eq!(experiment.sample_size_a, 2);
    }

    #[test]
    fn winner_is_none_below_min_samples() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let runner = ExperimentRunner::new(&store);
        let id = runner.create_experiment("hook-writer", "shorter hooks", "engagement_rate", Utc::now()).unwrap();
        let outcome = runner.check_winner(id, Utc::now()).unwrap();
        assert!(!outcome.complete);
        assert!(outcome.winner.is_none());
    }
}
