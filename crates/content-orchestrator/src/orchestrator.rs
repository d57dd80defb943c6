//! Owns every crate's entry point and ties them into five independently
//! scheduled loops (scout, tracker, engagement, feedback, review), gated by
//! a single cost-derived operation mode (§4.11, §4.1 orchestration loop).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use content_core::types::{DeferredVideo, Id, MediaAsset};
use content_core::CoreResult;
use content_pipeline::{Analyst, AnalystReport, ApprovalQueue, Creator, CreatorReport, Scout, ScoutReport};
use content_providers::{ImageProvider, LlmProvider, VideoPayload, VideoProvider};
use content_publish::{MetricsCollector, MetricsReport, PublishReport, PublishService, PublisherRegistry};
use content_skills::SkillLibrary;
use content_sources::{HealthRegistry, SourceAdapter};
use content_store::{SelectVariantOutcome, Store};

use content_learning::{CycleSummary, FailurePatternTracker, FeedbackLoop};

use crate::config::OrchestratorConfig;
use crate::cost_tracking::CostTrackingLlm;
use crate::mode::OperationMode;
use crate::review::{ReviewCycle, ReviewReport};

#[derive(Debug, Clone)]
pub struct ScoutCycleReport {
    pub scout: ScoutReport,
    pub analyst: AnalystReport,
    pub creator: Option<CreatorReport>,
    pub approved: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TrackerCycleReport {
    pub publish: PublishReport,
    pub metrics: MetricsReport,
    pub feedback_triggered: bool,
}

/// Engagement tracking (comment scraping, proactive replies) is a browser
/// automation feature out of scope here; this keeps the external contract
/// of a report shape without driving a browser.
#[derive(Debug, Clone, Default)]
pub struct EngagementCycleReport {
    pub checked: usize,
}

#[derive(Debug, Clone)]
pub struct OrchestratorStatus {
    pub running: bool,
    pub demo_mode: bool,
    pub active_loops: Vec<String>,
    pub last_run: BTreeMap<String, DateTime<Utc>>,
    pub skills_loaded: usize,
    pub daily_cost_limit: f64,
    pub operation_mode: String,
    pub mode_changed_at: Option<DateTime<Utc>>,
    pub mode_description: String,
}

const LOOP_NAMES: [&str; 5] = ["scout", "tracker", "engagement", "feedback", "review"];

pub struct Orchestrator {
    store: Store,
    sources: Vec<Box<dyn SourceAdapter>>,
    health: HealthRegistry,
    skills: SkillLibrary,
    llm: Box<dyn LlmProvider>,
    images: Box<dyn ImageProvider>,
    videos: Box<dyn VideoProvider>,
    publishers: PublisherRegistry,
    failure_tracker: FailurePatternTracker,
    config: OrchestratorConfig,
    mode: RwLock<OperationMode>,
    mode_changed_at: RwLock<Option<DateTime<Utc>>>,
    last_run: DashMap<String, DateTime<Utc>>,
    running: AtomicBool,
    shutdown: Notify,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    media_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(
        store: Store,
        sources: Vec<Box<dyn SourceAdapter>>,
        skills: SkillLibrary,
        llm: Box<dyn LlmProvider>,
        images: Box<dyn ImageProvider>,
        videos: Box<dyn VideoProvider>,
        publishers: PublisherRegistry,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            sources,
            health: HealthRegistry::new(),
            skills,
            llm,
            images,
            videos,
            publishers,
            failure_tracker: FailurePatternTracker::new(),
            config,
            mode: RwLock::new(OperationMode::Full),
            mode_changed_at: RwLock::new(None),
            last_run: DashMap::new(),
            running: AtomicBool::new(false),
            shutdown: Notify::new(),
            tasks: Mutex::new(Vec::new()),
            media_tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn mode(&self) -> OperationMode {
        *self.mode.read().unwrap()
    }

    /// Recomputes today's spend against `daily_cost_limit` and flips mode if
    /// the ratio crossed a threshold. A limit of `0.0` disables this (always
    /// `Full`).
    pub fn update_operation_mode(&self, now: DateTime<Utc>) -> OperationMode {
        let limit = self.config.daily_cost_limit;
        let ratio = if limit > 0.0 {
            let start_of_day = now.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
            let cost_today = self.store.cost_since(start_of_day).unwrap_or(0.0);
            cost_today / limit
        } else {
            0.0
        };
        let new_mode = OperationMode::for_cost_ratio(ratio);

        let mut mode = self.mode.write().unwrap();
        if *mode != new_mode {
            tracing::warn!(
                from = mode.as_str(),
                to = new_mode.as_str(),
                cost_ratio = ratio,
                daily_cost_limit = limit,
                "operation mode changed"
            );
            *mode = new_mode;
            *self.mode_changed_at.write().unwrap() = Some(now);
        }
        *mode
    }

    /// Scout -> Analyst always; Creator only if the current mode allows
    /// creation, capped at the mode's creation limit; then every still-
    /// pending creation is run through the approval gate, stripping video
    /// metadata when the mode calls for it (§4.11 `_scout_cycle`).
    pub async fn scout_cycle(&self, now: DateTime<Utc>) -> CoreResult<ScoutCycleReport> {
        let mode = self.mode();

        let scout = Scout::new(&self.store, &self.health, &self.sources);
        let scout_report = scout.run(now).await?;

        let analyst_llm = CostTrackingLlm::new(self.llm.as_ref(), &self.store, "analyst");
        let analyst = Analyst::new(&self.store, &self.skills, &analyst_llm);
        let analyst_report = analyst.run(now).await?;

        let creator_report = if mode.creation_allowed() {
            let creator_llm = CostTrackingLlm::new(self.llm.as_ref(), &self.store, "creator");
            let creator = Creator::new(
                &self.store,
                &self.skills,
                &creator_llm,
                self.images.as_ref(),
                Some(&self.failure_tracker),
            );
            Some(creator.run(Some(mode.creation_limit()), now).await?)
        } else {
            tracing::info!(mode = mode.as_str(), "creation skipped under current operation mode");
            None
        };

        let queue = ApprovalQueue::new(&self.store);
        let approved = queue.process_pending(now, mode.skip_video())?;

        tracing::info!(
            new_discoveries = scout_report.new_discoveries,
            analyzed = analyst_report.analyzed,
            created = creator_report.as_ref().map(|r| r.content_created).unwrap_or(0),
            approved = approved.len(),
            "scout cycle complete"
        );

        Ok(ScoutCycleReport {
            scout: scout_report,
            analyst: analyst_report,
            creator: creator_report,
            approved: approved.len(),
        })
    }

    /// Publishes whatever cleared approval, collects due metrics, and
    /// opportunistically runs the feedback cycle if enough skills updated
    /// this tick (§4.11 `_tracker_cycle`).
    pub async fn tracker_cycle(&self, now: DateTime<Utc>) -> CoreResult<TrackerCycleReport> {
        let publish_service = PublishService::new(&self.store, &self.publishers);
        let publish_report = publish_service.run(now).await?;

        let metrics_collector = MetricsCollector::new(&self.store, &self.skills, &self.publishers);
        let metrics_report = metrics_collector.run(now).await?;

        let feedback_triggered = metrics_report.should_trigger_feedback();
        if feedback_triggered {
            tracing::info!(
                skills_updated = metrics_report.skills_updated,
                "tracker metrics crossed feedback threshold, running feedback cycle"
            );
            if let Err(err) = self.feedback_cycle(now).await {
                tracing::error!(error = %err, "opportunistic feedback cycle failed");
            }
        }

        Ok(TrackerCycleReport { publish: publish_report, metrics: metrics_report, feedback_triggered })
    }

    pub async fn engagement_cycle(&self, _now: DateTime<Utc>) -> CoreResult<EngagementCycleReport> {
        Ok(EngagementCycleReport::default())
    }

    pub async fn feedback_cycle(&self, now: DateTime<Utc>) -> CoreResult<CycleSummary> {
        let feedback = FeedbackLoop::new(&self.store, &self.skills, &self.failure_tracker);
        feedback.run_cycle(now).await
    }

    pub async fn review_cycle(&self, now: DateTime<Utc>) -> CoreResult<ReviewReport> {
        let review_llm = CostTrackingLlm::new(self.llm.as_ref(), &self.store, "reviewer");
        let review = ReviewCycle::new(&self.store, &self.skills, &review_llm);
        review.run(now).await
    }

    /// Manual trigger bypassing the loop's own scheduling skip-check; the
    /// cycle's internal mode gating (creation limit, video skip) still
    /// applies.
    pub async fn trigger_scout(&self) -> CoreResult<ScoutCycleReport> {
        self.scout_cycle(Utc::now()).await
    }

    /// Human-approval entry point for a `pending_review` creation (§4.6
    /// variant selection). Transactionally approves `creation_id` and
    /// rejects its variant-group siblings, then — if the winner carries a
    /// deferred media descriptor — spawns the video-generation task exactly
    /// once, tracking its handle so `stop` can await it (§5 ordering
    /// guarantee ii, §9 background task handles).
    pub fn approve_variant(
        self: &Arc<Self>,
        creation_id: Id,
        now: DateTime<Utc>,
    ) -> CoreResult<SelectVariantOutcome> {
        let outcome = self.store.select_variant(creation_id, now)?;

        if let Some(creation) = self.store.get_creation(creation_id)? {
            if creation.video.is_set() {
                let this = Arc::clone(self);
                let handle = tokio::spawn(async move {
                    this.generate_deferred_media(creation_id, creation.video.clone()).await;
                });
                self.media_tasks.lock().unwrap().push(handle);
            }
        }

        Ok(outcome)
    }

    /// Rejects every creation in `creation_id`'s variant group, including
    /// itself. No deferred media is ever produced for a rejected group.
    pub fn reject_variant(&self, creation_id: Id) -> CoreResult<Vec<Id>> {
        self.store.reject_variant_group(creation_id)
    }

    async fn generate_deferred_media(&self, creation_id: Id, video: DeferredVideo) {
        let Some(video_type) = video.video_type else { return };
        let payload = if let Some(script) = video.video_script {
            VideoPayload::Script(script)
        } else if let Some(prompt) = video.video_prompt {
            VideoPayload::Prompt(prompt)
        } else if let Some(composition) = video.video_composition {
            VideoPayload::Composition(composition)
        } else {
            return;
        };

        match self.videos.generate(video_type, payload).await {
            Ok(result) => {
                let Some(url) = result.video_url.or(result.local_path) else { return };
                if let Err(err) = self.store.mutate_creation(creation_id, |c| {
                    c.media_urls.push(MediaAsset::Video { url: url.clone(), source: result.provider.clone() });
                }) {
                    tracing::error!(creation_id, error = %err, "failed to persist deferred media result");
                }
            }
            Err(err) => {
                tracing::warn!(creation_id, error = %err, "deferred media generation failed; approval unaffected");
            }
        }
    }

    async fn run_loop<F, Fut>(self: Arc<Self>, name: &'static str, interval_secs: u64, task: F)
    where
        F: Fn(Arc<Orchestrator>, DateTime<Utc>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Utc::now();
                    if self.config.daily_cost_limit > 0.0 {
                        self.update_operation_mode(now);
                    }
                    if !self.mode().should_run(name) {
                        tracing::debug!(loop_name = name, mode = self.mode().as_str(), "loop skipped under current mode");
                        continue;
                    }
                    task(Arc::clone(&self), now).await;
                    self.last_run.insert(name.to_string(), now);
                }
                _ = self.shutdown.notified() => {
                    tracing::info!(loop_name = name, "loop shutting down");
                    break;
                }
            }
        }
    }

    /// Spawns the five periodic loops. No-op (besides loading skills) in
    /// `demo_mode`, where only manual triggers run.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        if self.config.seed_on_startup {
            if let Err(err) = self.skills.load_all() {
                tracing::error!(error = %err, "failed to load skill library on startup");
            }
        }

        if self.config.demo_mode {
            tracing::info!("demo mode enabled: automatic scheduling disabled, use manual triggers");
            return;
        }

        let mut tasks = self.tasks.lock().unwrap();

        tasks.push(tokio::spawn(Arc::clone(self).run_loop("scout", self.config.scout_interval_secs, |o, now| async move {
            match o.scout_cycle(now).await {
                Ok(report) => tracing::info!(new_discoveries = report.scout.new_discoveries, "scout loop tick"),
                Err(err) => tracing::error!(error = %err, "scout cycle failed"),
            }
        })));

        tasks.push(tokio::spawn(Arc::clone(self).run_loop("tracker", self.config.tracker_interval_secs, |o, now| async move {
            match o.tracker_cycle(now).await {
                Ok(report) => tracing::info!(published = report.publish.published, "tracker loop tick"),
                Err(err) => tracing::error!(error = %err, "tracker cycle failed"),
            }
        })));

        tasks.push(tokio::spawn(Arc::clone(self).run_loop("engagement", self.config.engagement_interval_secs, |o, now| async move {
            if let Err(err) = o.engagement_cycle(now).await {
                tracing::error!(error = %err, "engagement cycle failed");
            }
        })));

        tasks.push(tokio::spawn(Arc::clone(self).run_loop("feedback", self.config.feedback_interval_secs, |o, now| async move {
            match o.feedback_cycle(now).await {
                Ok(summary) => tracing::info!(patterns = summary.patterns_found, "feedback loop tick"),
                Err(err) => tracing::error!(error = %err, "feedback cycle failed"),
            }
        })));

        tasks.push(tokio::spawn(Arc::clone(self).run_loop("review", self.config.review_interval_secs, |o, now| async move {
            match o.review_cycle(now).await {
                Ok(report) => tracing::info!(recommendations = report.recommendations.len(), "review loop tick"),
                Err(err) => tracing::error!(error = %err, "review cycle failed"),
            }
        })));

        tracing::info!(loops = LOOP_NAMES.len(), "orchestrator started");
    }

    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shutdown.notify_waiters();
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut self.tasks.lock().unwrap());
        for handle in handles {
            let _ = handle.await;
        }
        let media_handles: Vec<JoinHandle<()>> = std::mem::take(&mut self.media_tasks.lock().unwrap());
        for handle in media_handles {
            let _ = handle.await;
        }
        tracing::info!("orchestrator stopped");
    }

    pub fn status(&self) -> OrchestratorStatus {
        let mode = self.mode();
        let active_loops: Vec<String> = if !self.running.load(Ordering::SeqCst) || self.config.demo_mode {
            Vec::new()
        } else {
            LOOP_NAMES.iter().map(|s| s.to_string()).collect()
        };
        OrchestratorStatus {
            running: self.running.load(Ordering::SeqCst),
            demo_mode: self.config.demo_mode,
            active_loops,
            last_run: self.last_run.iter().map(|e| (e.key().clone(), *e.value())).collect(),
            skills_loaded: self.skills.all_skills().len(),
            daily_cost_limit: self.config.daily_cost_limit,
            operation_mode: mode.as_str().to_string(),
            mode_changed_at: *self.mode_changed_at.read().unwrap(),
            mode_description: mode.description().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use content_providers::LlmResponse;

    struct StubLlm;

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn provider_name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, _s: &str, _u: &str, _m: u32, _j: bool) -> CoreResult<LlmResponse> {
            Ok(LlmResponse {
                text: "[]".into(),
                input_tokens: 1,
                output_tokens: 1,
                model: "stub".into(),
                provider: "stub".into(),
                latency_ms: 0.0,
                cost_usd: 0.01,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn orchestrator(dir: &tempfile::TempDir, daily_cost_limit: f64) -> Orchestrator {
        let store = Store::open(dir.path().join("db")).unwrap();
        let skills_store = Store::open(dir.path().join("skills_db")).unwrap();
        let skills = SkillLibrary::new(dir.path().join("skills"), skills_store);
        let mut config = OrchestratorConfig::from_env();
        config.daily_cost_limit = daily_cost_limit;
        config.demo_mode = true;
        Orchestrator::new(
            store,
            Vec::new(),
            skills,
            Box::new(StubLlm),
            Box::new(content_providers::LocalPlaceholderImage),
            Box::new(content_providers::LocalPlaceholderVideo),
            PublisherRegistry::default_registry(),
            config,
        )
    }

    #[tokio::test]
    async fn scout_cycle_runs_with_no_sources_or_pending_work() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(&dir, 0.0);
        let report = orchestrator.scout_cycle(Utc::now()).await.unwrap();
        assert_eq!(report.scout.new_discoveries, 0);
        assert_eq!(report.analyst.analyzed, 0);
        assert!(report.creator.is_some());
    }

    #[tokio::test]
    async fn approve_variant_dispatches_deferred_video_exactly_once() {
        use content_core::types::{ApprovalStatus, Creation, DeferredVideo, VideoType};

        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Arc::new(orchestrator(&dir, 0.0));
        let now = Utc::now();

        let base = Creation {
            id: 0,
            discovery_id: 1,
            platform: "linkedin".into(),
            format: "post".into(),
            title: "Winner".into(),
            body: "Body".into(),
            media_urls: vec![],
            skills_used: vec![],
            risk_score: Some(0.1),
            risk_flags: vec![],
            quality_score: Some(0.8),
            quality_issues: vec![],
            variant_group: Some("g1".into()),
            variant_label: Some("A".into()),
            approval_status: ApprovalStatus::PendingReview,
            video: DeferredVideo {
                video_type: Some(VideoType::MotionGraphics),
                video_type_rationale: None,
                video_script: None,
                video_prompt: Some("a prompt".into()),
                video_composition: None,
            },
            created_at: now,
            approved_at: None,
        };
        let winner_id = orchestrator.store.insert_creation(base.clone()).unwrap();
        let mut sibling = base.clone();
        sibling.variant_label = Some("B".into());
        let sibling_id = orchestrator.store.insert_creation(sibling).unwrap();

        let outcome = orchestrator.approve_variant(winner_id, now).unwrap();
        assert_eq!(outcome.approved_id, winner_id);
        assert_eq!(outcome.rejected_ids, vec![sibling_id]);

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut orchestrator.media_tasks.lock().unwrap());
        assert_eq!(handles.len(), 1, "exactly one deferred-media task should be spawned");
        for handle in handles {
            handle.await.unwrap();
        }

        let winner = orchestrator.store.get_creation(winner_id).unwrap().unwrap();
        assert_eq!(winner.approval_status, ApprovalStatus::Approved);
        assert_eq!(winner.media_urls.len(), 1);

        let sibling = orchestrator.store.get_creation(sibling_id).unwrap().unwrap();
        assert_eq!(sibling.approval_status, ApprovalStatus::Rejected);
    }

    #[tokio::test]
    async fn zero_daily_limit_always_stays_full() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(&dir, 0.0);
        let mode = orchestrator.update_operation_mode(Utc::now());
        assert_eq!(mode, OperationMode::Full);
    }

    #[tokio::test]
    async fn demo_mode_start_does_not_spawn_loops() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Arc::new(orchestrator(&dir, 0.0));
        orchestrator.start().await;
        let status = orchestrator.status();
        assert!(status.demo_mode);
        assert!(status.active_loops.is_empty());
        orchestrator.stop().await;
    }
}
