use chrono::{DateTime, Utc};

use content_core::types::{ApprovalStatus, Publication};
use content_core::{CoreError, CoreResult};
use content_store::Store;

use crate::publisher::PublisherRegistry;

#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    pub published: usize,
    pub errors: usize,
}

/// Pushes every approved-but-unpublished creation out through its
/// platform's `Publisher`, recording the `arbitrage_window_minutes`
/// between discovery and publication (§4.7).
pub struct PublishService<'a> {
    store: &'a Store,
    registry: &'a PublisherRegistry,
}

impl<'a> PublishService<'a> {
    pub fn new(store: &'a Store, registry: &'a PublisherRegistry) -> Self {
        Self { store, registry }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> CoreResult<PublishReport> {
        let mut report = PublishReport::default();

        let mut candidates = self.store.creations_by_approval_status(ApprovalStatus::AutoApproved)?;
        candidates.extend(self.store.creations_by_approval_status(ApprovalStatus::Approved)?);

        for creation in candidates {
            let Some(publisher) = self.registry.for_platform(&creation.platform) else {
                tracing::warn!(platform = %creation.platform, "no publisher registered for platform");
                report.errors += 1;
                continue;
            };

            match publisher.publish(&creation).await {
                Ok(result) => {
                    let discovery = self.store.get_discovery(creation.discovery_id)?;
                    let arbitrage_window_minutes = discovery.and_then(|d| {
                        let minutes = (now - d.discovered_at).num_minutes();
                        if minutes > 0 {
                            Some(minutes)
                        } else {
                            None
                        }
                    });

                    let publication = Publication {
                        id: 0,
                        creation_id: creation.id,
                        platform: creation.platform.clone(),
                        platform_post_id: result.platform_post_id,
                        platform_url: result.platform_url,
                        arbitrage_window_minutes,
                        published_at: now,
                    };
                    match self.store.insert_publication(publication) {
                        Ok(_) => report.published += 1,
                        Err(CoreError::Invariant(msg)) => {
                            tracing::debug!(msg, "publication already exists, skipping");
                        }
                        Err(err) => return Err(err),
                    }
                }
                Err(err) => {
                    tracing::error!(platform = %creation.platform, error = %err, "publish failed");
                    report.errors += 1;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_core::types::{Creation, DeferredVideo, MediaAsset};

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (dir, store)
    }

    fn approved_creation(discovery_id: u64, platform: &str) -> Creation {
        Creation {
            id: 0,
            discovery_id,
            platform: platform.to_string(),
            format: "post".into(),
            title: "t".into(),
            body: "b".into(),
            media_urls: vec![MediaAsset::Image { url: "img".into() }],
            skills_used: vec![],
            risk_score: Some(0.1),
            risk_flags: vec![],
            quality_score: Some(0.9),
            quality_issues: vec![],
            variant_group: None,
            variant_label: None,
            approval_status: ApprovalStatus::AutoApproved,
            video: DeferredVideo::default(),
            created_at: Utc::now(),
            approved_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn publishes_and_computes_arbitrage_window() {
        let (_dir, store) = store();
        let item = content_core::types::DiscoveryItem {
            source: "hackernews".into(),
            source_id: "1".into(),
            title: "x".into(),
            url: "https://x".into(),
            raw_score: 1.0,
            raw_data: serde_json::json!({}),
            discovered_at: Utc::now() - chrono::Duration::minutes(90),
        };
        let (discovery_id, _) = store.insert_discovery_if_new(item).unwrap();
        let creation_id = store.insert_creation(approved_creation(discovery_id, "linkedin")).unwrap();

        let registry = PublisherRegistry::default_registry();
        let service = PublishService::new(&store, &registry);
        let report = service.run(Utc::now()).await.unwrap();
        assert_eq!(report.published, 1);
        assert_eq!(report.errors, 0);

        let publications = store.all_publications().unwrap();
        assert_eq!(publications.len(), 1);
        assert_eq!(publications[0].creation_id, creation_id);
        assert!(publications[0].arbitrage_window_minutes.unwrap() >= 89);
    }

    #[tokio::test]
    async fn second_run_does_not_duplicate_publication() {
        let (_dir, store) = store();
        let item = content_core::types::DiscoveryItem {
            source: "hackernews".into(),
            source_id: "1".into(),
            title: "x".into(),
            url: "https://x".into(),
            raw_score: 1.0,
            raw_data: serde_json::json!({}),
            discovered_at: Utc::now(),
        };
        let (discovery_id, _) = store.insert_discovery_if_new(item).unwrap();
        store.insert_creation(approved_creation(discovery_id, "linkedin")).unwrap();

        let registry = PublisherRegistry::default_registry();
        let service = PublishService::new(&store, &registry);
        let first = service.run(Utc::now()).await.unwrap();
        assert_eq!(first.published, 1);
        let second = service.run(Utc::now()).await.unwrap();
        assert_eq!(second.published, 0);
        assert_eq!(store.all_publications().unwrap().len(), 1);
    }
}
