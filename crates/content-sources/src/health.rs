use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Consecutive-failure count at which a source starts logging warnings but
/// is still invoked.
pub const REDUCED_THRESHOLD: u32 = 3;
/// Consecutive-failure count at which a source is skipped and backoff starts.
pub const SKIP_THRESHOLD: u32 = 5;
const MAX_BACKOFF_HOURS: i64 = 24;

#[derive(Debug, Clone, Default)]
pub struct SourceHealth {
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub total_successes: u64,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub backoff_until: Option<DateTime<Utc>>,
}

impl SourceHealth {
    pub fn should_skip(&self, now: DateTime<Utc>) -> bool {
        self.consecutive_failures >= SKIP_THRESHOLD
            || self.backoff_until.map(|until| now < until).unwrap_or(false)
    }
}

/// Per-source consecutive/total failure counts, backoff clock, success rate.
/// Process-local — every source starts healthy after a restart (§4.3).
pub struct HealthRegistry {
    sources: DashMap<String, SourceHealth>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            sources: DashMap::new(),
        }
    }

    pub fn snapshot(&self, name: &str) -> SourceHealth {
        self.sources.get(name).map(|e| e.clone()).unwrap_or_default()
    }

    pub fn should_skip(&self, name: &str, now: DateTime<Utc>) -> bool {
        self.snapshot(name).should_skip(now)
    }

    pub fn record_success(&self, name: &str, now: DateTime<Utc>) {
        let mut entry = self.sources.entry(name.to_string()).or_default();
        entry.consecutive_failures = 0;
        entry.backoff_until = None;
        entry.total_successes += 1;
        entry.last_success_at = Some(now);
    }

    pub fn record_failure(&self, name: &str, now: DateTime<Utc>) {
        let mut entry = self.sources.entry(name.to_string()).or_default();
        entry.consecutive_failures += 1;
        entry.total_failures += 1;
        entry.last_failure_at = Some(now);

        if entry.consecutive_failures >= REDUCED_THRESHOLD {
            tracing::warn!(
                source = name,
                consecutive_failures = entry.consecutive_failures,
                "source approaching backoff threshold"
            );
        }

        if entry.consecutive_failures >= SKIP_THRESHOLD {
            let exponent = entry.consecutive_failures - SKIP_THRESHOLD;
            let hours = 2u64.checked_pow(exponent).unwrap_or(u64::MAX).min(MAX_BACKOFF_HOURS as u64);
            let until = now + Duration::hours(hours as i64);
            tracing::warn!(source = name, backoff_hours = hours, "source entering backoff");
            entry.backoff_until = Some(until);
        }
    }

    pub fn reset(&self, name: &str) {
        self.sources.insert(name.to_string(), SourceHealth::default());
    }

    pub fn all(&self) -> Vec<(String, SourceHealth)> {
        self.sources.iter().map(|e| (e.key().clone(), e.value().clone())).collect()
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_escalates_and_caps() {
        let registry = HealthRegistry::new();
        let t0 = Utc::now();
        for _ in 0..5 {
            registry.record_failure("x", t0);
        }
        let h = registry.snapshot("x");
        assert_eq!(h.consecutive_failures, 5);
        let until = h.backoff_until.unwrap();
        assert!(until - t0 >= Duration::hours(1));

        for _ in 0..5 {
            registry.record_failure("x", t0);
        }
        let h = registry.snapshot("x");
        assert_eq!(h.consecutive_failures, 10);
        let until = h.backoff_until.unwrap();
        assert!(until - t0 >= Duration::hours(24));
        assert!(until - t0 < Duration::hours(25));
    }

    #[test]
    fn success_clears_backoff() {
        let registry = HealthRegistry::new();
        let t0 = Utc::now();
        for _ in 0..6 {
            registry.record_failure("x", t0);
        }
        registry.record_success("x", t0);
        let h = registry.snapshot("x");
        assert_eq!(h.consecutive_failures, 0);
        assert!(h.backoff_until.is_none());
        assert!(!h.should_skip(t0));
    }
}
