use chrono::{DateTime, Utc};

use content_core::types::{ApprovalStatus, Creation, DeferredVideo, Id, RiskLevel};
use content_core::CoreResult;
use content_store::Store;

use crate::quality_gate::QualityGate;
use crate::risk_assessor::RiskAssessor;

/// Runs every freshly created candidate through quality and risk checks and
/// assigns its approval status. Quality rejection is terminal; everything
/// else is ordered risk-first (§4.7 routing table).
pub struct ApprovalQueue<'a> {
    store: &'a Store,
}

impl<'a> ApprovalQueue<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn process(&self, creation_id: Id, now: DateTime<Utc>) -> CoreResult<Creation> {
        self.process_with_video_policy(creation_id, now, false)
    }

    /// Evaluate every creation still sitting in `Pending` against the
    /// quality/risk gates. `skip_video` strips deferred video metadata from
    /// anything that clears the gate — the cost-degradation REDUCED mode's
    /// way of cutting spend without touching the pipeline shape.
    pub fn process_pending(&self, now: DateTime<Utc>, skip_video: bool) -> CoreResult<Vec<Creation>> {
        let pending = self.store.creations_by_approval_status(ApprovalStatus::Pending)?;
        let mut processed = Vec::with_capacity(pending.len());
        for creation in pending {
            processed.push(self.process_with_video_policy(creation.id, now, skip_video)?);
        }
        Ok(processed)
    }

    fn process_with_video_policy(&self, creation_id: Id, now: DateTime<Utc>, skip_video: bool) -> CoreResult<Creation> {
        let creation = self
            .store
            .get_creation(creation_id)?
            .ok_or_else(|| content_core::CoreError::NotFound(format!("creation {creation_id}")))?;

        let quality = QualityGate::check(&creation.title, &creation.body, &creation.platform);

        if quality.auto_reject {
            return self.store.mutate_creation(creation_id, |c| {
                c.quality_score = Some(quality.score);
                c.quality_issues = quality.issues.clone();
                c.approval_status = ApprovalStatus::QualityRejected;
            });
        }

        let risk = RiskAssessor::assess(&creation.body, &creation.title);

        let status = if risk.level == RiskLevel::High {
            ApprovalStatus::Rejected
        } else if creation.variant_group.is_some() {
            ApprovalStatus::PendingReview
        } else if risk.level == RiskLevel::Low && !quality.warning {
            ApprovalStatus::AutoApproved
        } else if risk.level == RiskLevel::Low && quality.warning {
            ApprovalStatus::PendingReview
        } else {
            ApprovalStatus::Pending
        };

        self.store.mutate_creation(creation_id, |c| {
            c.quality_score = Some(quality.score);
            c.quality_issues = quality.issues.clone();
            c.risk_score = Some(risk.score);
            c.risk_flags = risk.flags.clone();
            c.approval_status = status;
            if status == ApprovalStatus::AutoApproved {
                c.approved_at = Some(now);
            }
            if skip_video {
                c.video = DeferredVideo::default();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_core::types::MediaAsset;

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (dir, store)
    }

    fn base_creation(body: &str, title: &str, variant_group: Option<&str>) -> Creation {
        Creation {
            id: 0,
            discovery_id: 1,
            platform: "linkedin".into(),
            format: "post".into(),
            title: title.into(),
            body: body.into(),
            media_urls: vec![MediaAsset::Image { url: "img".into() }],
            skills_used: vec![],
            risk_score: None,
            risk_flags: vec![],
            quality_score: None,
            quality_issues: vec![],
            variant_group: variant_group.map(|s| s.to_string()),
            variant_label: variant_group.map(|_| "A".to_string()),
            approval_status: ApprovalStatus::Pending,
            video: Default::default(),
            created_at: Utc::now(),
            approved_at: None,
        }
    }

    #[test]
    fn clean_solo_creation_is_auto_approved() {
        let (_d, store) = store();
        let body = "The release shipped on schedule.\n\nTeams coordinated across three time zones without a single blocked merge. The retro surfaced one process gap worth fixing next quarter.";
        let id = store.insert_creation(base_creation(body, "Shipping without drama", None)).unwrap();
        let queue = ApprovalQueue::new(&store);
        let result = queue.process(id, Utc::now()).unwrap();
        assert_eq!(result.approval_status, ApprovalStatus::AutoApproved);
    }

    #[test]
    fn variant_group_always_goes_to_review() {
        let (_d, store) = store();
        let body = "The release shipped on schedule.\n\nTeams coordinated across three time zones without a single blocked merge. The retro surfaced one process gap worth fixing next quarter.";
        let id = store.insert_creation(base_creation(body, "Shipping without drama", Some("g1"))).unwrap();
        let queue = ApprovalQueue::new(&store);
        let result = queue.process(id, Utc::now()).unwrap();
        assert_eq!(result.approval_status, ApprovalStatus::PendingReview);
    }

    #[test]
    fn high_risk_body_is_rejected_even_without_variant_group() {
        let (_d, store) = store();
        let body = "This is grounds for a lawsuit, it's fraud, and it's guaranteed to work 100% of the time.";
        let id = store.insert_creation(base_creation(body, "Big claim", None)).unwrap();
        let queue = ApprovalQueue::new(&store);
        let result = queue.process(id, Utc::now()).unwrap();
        assert_eq!(result.approval_status, ApprovalStatus::Rejected);
    }

    #[test]
    fn placeholder_body_is_quality_rejected_before_risk_runs() {
        let (_d, store) = store();
        let id = store
            .insert_creation(base_creation("This is a [PLACEHOLDER] body.", "Title", None))
            .unwrap();
        let queue = ApprovalQueue::new(&store);
        let result = queue.process(id, Utc::now()).unwrap();
        assert_eq!(result.approval_status, ApprovalStatus::QualityRejected);
        assert!(result.risk_score.is_none());
    }
}
