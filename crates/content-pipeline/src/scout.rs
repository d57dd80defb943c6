use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use content_core::CoreResult;
use content_sources::{HealthRegistry, SourceAdapter};
use content_store::Store;

#[derive(Debug, Clone)]
pub enum SourceOutcome {
    Ok { count: usize },
    Skipped { consecutive_failures: u32 },
    Error { consecutive_failures: u32, message: String },
}

#[derive(Debug, Clone)]
pub struct ScoutReport {
    pub new_discoveries: usize,
    pub active_sources: usize,
    pub skipped_sources: Vec<String>,
    pub source_stats: BTreeMap<String, SourceOutcome>,
}

/// Fans out to every registered source, skipping those in backoff, then
/// dedups and persists whatever comes back (§4.2).
pub struct Scout<'a> {
    store: &'a Store,
    health: &'a HealthRegistry,
    sources: &'a [Box<dyn SourceAdapter>],
}

impl<'a> Scout<'a> {
    pub fn new(store: &'a Store, health: &'a HealthRegistry, sources: &'a [Box<dyn SourceAdapter>]) -> Self {
        Self { store, health, sources }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> CoreResult<ScoutReport> {
        let mut active = Vec::new();
        let mut skipped_sources = Vec::new();
        let mut source_stats = BTreeMap::new();

        for src in self.sources {
            if self.health.should_skip(src.name(), now) {
                let snapshot = self.health.snapshot(src.name());
                skipped_sources.push(src.name().to_string());
                source_stats.insert(
                    src.name().to_string(),
                    SourceOutcome::Skipped {
                        consecutive_failures: snapshot.consecutive_failures,
                    },
                );
            } else {
                active.push(src.as_ref());
            }
        }
        if !skipped_sources.is_empty() {
            tracing::warn!(sources = ?skipped_sources, "sources in backoff");
        }

        let fetches = active.iter().map(|src| async move {
            let result = src.fetch().await;
            (src.name(), result)
        });
        let results = futures::future::join_all(fetches).await;

        let mut all_items = Vec::new();
        for (name, result) in results {
            match result {
                Ok(items) => {
                    self.health.record_success(name, now);
                    source_stats.insert(name.to_string(), SourceOutcome::Ok { count: items.len() });
                    all_items.extend(items);
                }
                Err(err) => {
                    self.health.record_failure(name, now);
                    let consecutive_failures = self.health.snapshot(name).consecutive_failures;
                    tracing::error!(source = name, error = %err, "source fetch failed");
                    source_stats.insert(
                        name.to_string(),
                        SourceOutcome::Error {
                            consecutive_failures,
                            message: err.to_string(),
                        },
                    );
                }
            }
        }

        let mut new_count = 0;
        for item in all_items {
            let (_, inserted) = self.store.insert_discovery_if_new(item)?;
            if inserted {
                new_count += 1;
            }
        }

        tracing::info!(
            new_discoveries = new_count,
            active = active.len(),
            total = self.sources.len(),
            skipped = skipped_sources.len(),
            "scout run complete"
        );

        Ok(ScoutReport {
            new_discoveries: new_count,
            active_sources: active.len(),
            skipped_sources,
            source_stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use content_core::types::DiscoveryItem;
    use content_core::CoreError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakySource {
        name: &'static str,
        calls: AtomicUsize,
        fail_first_n: usize,
    }

    #[async_trait]
    impl SourceAdapter for FlakySource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self) -> CoreResult<Vec<DiscoveryItem>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first_n {
                return Err(CoreError::SourceAdapter {
                    source: self.name.to_string(),
                    message: "simulated failure".into(),
                });
            }
            Ok(vec![DiscoveryItem {
                source: self.name.to_string(),
                source_id: "1".into(),
                title: "title".into(),
                url: "https://example.com".into(),
                raw_score: 10.0,
                raw_data: serde_json::json!({}),
                discovered_at: Utc::now(),
            }])
        }
    }

    #[tokio::test]
    async fn dedups_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let health = HealthRegistry::new();
        let sources: Vec<Box<dyn SourceAdapter>> = vec![Box::new(FlakySource {
            name: "test_source",
            calls: AtomicUsize::new(0),
            fail_first_n: 0,
        })];

        let scout = Scout::new(&store, &health, &sources);
        let first = scout.run(Utc::now()).await.unwrap();
        assert_eq!(first.new_discoveries, 1);
        let second = scout.run(Utc::now()).await.unwrap();
        assert_eq!(second.new_discoveries, 0);
    }

    #[tokio::test]
    async fn repeated_failures_eventually_trigger_skip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let health = HealthRegistry::new();
        let sources: Vec<Box<dyn SourceAdapter>> = vec![Box::new(FlakySource {
            name: "flaky",
            calls: AtomicUsize::new(0),
            fail_first_n: 100,
        })];

        let scout = Scout::new(&store, &health, &sources);
        let now = Utc::now();
        for _ in 0..5 {
            scout.run(now).await.unwrap();
        }
        assert!(health.should_skip("flaky", now));
        let report = scout.run(now).await.unwrap();
        assert_eq!(report.active_sources, 0);
        assert_eq!(report.skipped_sources, vec!["flaky".to_string()]);
    }
}
