use std::path::Path;

use chrono::{DateTime, Utc};
use content_core::types::{
    AgentRun, Creation, Discovery, DiscoveryItem, DiscoveryStatus, Experiment, ExperimentStatus,
    Id, Metric, MetricInterval, Publication, Skill, SkillInteraction, SkillMetric,
};
use content_core::{CoreError, CoreResult};

use crate::keys::{
    creation_platform_key, id_from_key, id_key, interaction_key, pub_interval_key,
    skill_metric_key, skill_metric_prefix,
};

const CREATION_ROW_MARKER: u8 = 0x00;
const CREATION_GROUP_INDEX_MARKER: u8 = 0x01;

fn creation_row_key(id: Id) -> Vec<u8> {
    let mut k = vec![CREATION_ROW_MARKER];
    k.extend_from_slice(&id_key(id));
    k
}

fn creation_group_index_key(group: &str) -> Vec<u8> {
    let mut k = vec![CREATION_GROUP_INDEX_MARKER];
    k.extend_from_slice(group.as_bytes());
    k
}

fn to_bytes<T: serde::Serialize>(v: &T) -> CoreResult<Vec<u8>> {
    serde_json::to_vec(v).map_err(CoreError::from)
}

fn from_bytes<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    serde_json::from_slice(bytes).map_err(CoreError::from)
}

fn store_err(e: impl std::fmt::Display) -> CoreError {
    CoreError::Store(e.to_string())
}

/// The durable record of every pipeline entity.
pub struct Store {
    db: sled::Db,
    discoveries: sled::Tree,
    discoveries_by_hash: sled::Tree,
    creations: sled::Tree,
    publications: sled::Tree,
    publications_by_creation_platform: sled::Tree,
    metrics: sled::Tree,
    metrics_by_pub_interval: sled::Tree,
    skills: sled::Tree,
    skill_metrics: sled::Tree,
    skill_interactions: sled::Tree,
    experiments: sled::Tree,
    agent_runs: sled::Tree,
}

/// Result of a `select_variant` call: which creation became approved, and
/// which siblings were rejected alongside it.
#[derive(Debug, Clone)]
pub struct SelectVariantOutcome {
    pub approved_id: Id,
    pub rejected_ids: Vec<Id>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let db = sled::open(path).map_err(store_err)?;
        Ok(Self {
            discoveries: db.open_tree("discoveries").map_err(store_err)?,
            discoveries_by_hash: db.open_tree("discoveries_by_hash").map_err(store_err)?,
            creations: db.open_tree("creations").map_err(store_err)?,
            publications: db.open_tree("publications").map_err(store_err)?,
            publications_by_creation_platform: db
                .open_tree("publications_by_creation_platform")
                .map_err(store_err)?,
            metrics: db.open_tree("metrics").map_err(store_err)?,
            metrics_by_pub_interval: db.open_tree("metrics_by_pub_interval").map_err(store_err)?,
            skills: db.open_tree("skills").map_err(store_err)?,
            skill_metrics: db.open_tree("skill_metrics").map_err(store_err)?,
            skill_interactions: db.open_tree("skill_interactions").map_err(store_err)?,
            experiments: db.open_tree("experiments").map_err(store_err)?,
            agent_runs: db.open_tree("agent_runs").map_err(store_err)?,
            db,
        })
    }

    fn next_id(&self) -> CoreResult<Id> {
        self.db.generate_id().map_err(store_err)
    }

    // ---------------------------------------------------------------- Discovery

    /// Insert a freshly fetched item if its content hash is new. Returns the
    /// existing id without writing anything if it was already known — this is
    /// the dedup guarantee in testable property 1.
    pub fn insert_discovery_if_new(&self, item: DiscoveryItem) -> CoreResult<(Id, bool)> {
        let hash = content_core::types::content_hash(&item.title, &item.url);
        if let Some(existing) = self.discoveries_by_hash.get(hash.as_bytes()).map_err(store_err)? {
            return Ok((id_from_key(&existing), false));
        }
        let id = self.next_id()?;
        let discovery = Discovery::from_item(id, item);
        self.discoveries
            .insert(id_key(id), to_bytes(&discovery)?)
            .map_err(store_err)?;
        self.discoveries_by_hash
            .insert(hash.as_bytes(), id_key(id).to_vec())
            .map_err(store_err)?;
        Ok((id, true))
    }

    pub fn get_discovery(&self, id: Id) -> CoreResult<Option<Discovery>> {
        match self.discoveries.get(id_key(id)).map_err(store_err)? {
            Some(bytes) => Ok(Some(from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Re-fetch the row by id and mutate it within the write — resolves the
    /// "mutate a detached object, commit later" ambiguity by never allowing a
    /// caller to hold a stale copy across the write.
    pub fn mutate_discovery<F>(&self, id: Id, f: F) -> CoreResult<Discovery>
    where
        F: FnOnce(&mut Discovery),
    {
        let mut discovery = self
            .get_discovery(id)?
            .ok_or_else(|| CoreError::NotFound(format!("discovery {id}")))?;
        f(&mut discovery);
        self.discoveries
            .insert(id_key(id), to_bytes(&discovery)?)
            .map_err(store_err)?;
        Ok(discovery)
    }

    pub fn discoveries_by_status(&self, status: DiscoveryStatus) -> CoreResult<Vec<Discovery>> {
        let mut out = Vec::new();
        for entry in self.discoveries.iter() {
            let (_, bytes) = entry.map_err(store_err)?;
            let discovery: Discovery = from_bytes(&bytes)?;
            if discovery.status == status {
                out.push(discovery);
            }
        }
        out.sort_by(|a, b| b.discovered_at.cmp(&a.discovered_at));
        Ok(out)
    }

    // ----------------------------------------------------------------- Creation

    pub fn insert_creation(&self, mut creation: Creation) -> CoreResult<Id> {
        let id = self.next_id()?;
        creation.id = id;
        self.creations
            .insert(creation_row_key(id), to_bytes(&creation)?)
            .map_err(store_err)?;
        if let Some(group) = creation.variant_group.clone() {
            self.append_to_variant_index(&group, id)?;
        }
        Ok(id)
    }

    fn append_to_variant_index(&self, group: &str, id: Id) -> CoreResult<()> {
        let key = creation_group_index_key(group);
        let mut ids: Vec<Id> = match self.creations.get(&key).map_err(store_err)? {
            Some(bytes) => from_bytes(&bytes)?,
            None => Vec::new(),
        };
        if !ids.contains(&id) {
            ids.push(id);
        }
        self.creations.insert(key, to_bytes(&ids)?).map_err(store_err)?;
        Ok(())
    }

    pub fn get_creation(&self, id: Id) -> CoreResult<Option<Creation>> {
        match self.creations.get(creation_row_key(id)).map_err(store_err)? {
            Some(bytes) => Ok(Some(from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn mutate_creation<F>(&self, id: Id, f: F) -> CoreResult<Creation>
    where
        F: FnOnce(&mut Creation),
    {
        let mut creation = self
            .get_creation(id)?
            .ok_or_else(|| CoreError::NotFound(format!("creation {id}")))?;
        f(&mut creation);
        self.creations
            .insert(creation_row_key(id), to_bytes(&creation)?)
            .map_err(store_err)?;
        Ok(creation)
    }

    pub fn creations_by_approval_status(
        &self,
        status: content_core::types::ApprovalStatus,
    ) -> CoreResult<Vec<Creation>> {
        let mut out = Vec::new();
        for entry in self.creations.iter() {
            let (key, bytes) = entry.map_err(store_err)?;
            if key.first() != Some(&CREATION_ROW_MARKER) {
                continue;
            }
            let creation: Creation = from_bytes(&bytes)?;
            if creation.approval_status == status {
                out.push(creation);
            }
        }
        out.sort_by_key(|c| c.created_at);
        Ok(out)
    }

    pub fn all_creations(&self) -> CoreResult<Vec<Creation>> {
        let mut out = Vec::new();
        for entry in self.creations.iter() {
            let (key, bytes) = entry.map_err(store_err)?;
            if key.first() != Some(&CREATION_ROW_MARKER) {
                continue;
            }
            out.push(from_bytes(&bytes)?);
        }
        out.sort_by_key(|c: &Creation| c.created_at);
        Ok(out)
    }

    fn variant_group_members(&self, group: &str) -> CoreResult<Vec<Id>> {
        match self
            .creations
            .get(creation_group_index_key(group))
            .map_err(store_err)?
        {
            Some(bytes) => from_bytes(&bytes),
            None => Ok(Vec::new()),
        }
    }

    /// Transactionally approve one creation and reject every sibling sharing
    /// its `variant_group`. The one atomic, multi-row operation the design
    /// requires (§4.1, §5 ordering guarantee ii, testable property 2).
    pub fn select_variant(&self, creation_id: Id, now: DateTime<Utc>) -> CoreResult<SelectVariantOutcome> {
        let creation = self
            .get_creation(creation_id)?
            .ok_or_else(|| CoreError::NotFound(format!("creation {creation_id}")))?;
        let siblings: Vec<Id> = match &creation.variant_group {
            Some(group) => self
                .variant_group_members(group)?
                .into_iter()
                .filter(|id| *id != creation_id)
                .collect(),
            None => Vec::new(),
        };

        let outcome = self
            .creations
            .transaction(move |tx| {
                let row_key = creation_row_key(creation_id);
                let bytes = tx
                    .get(&row_key)?
                    .ok_or_else(|| sled::transaction::ConflictableTransactionError::Abort(()))?;
                let mut approved: Creation = serde_json::from_slice(&bytes)
                    .map_err(|_| sled::transaction::ConflictableTransactionError::Abort(()))?;
                approved.approval_status = content_core::types::ApprovalStatus::Approved;
                approved.approved_at = Some(now);
                let approved_bytes = serde_json::to_vec(&approved)
                    .map_err(|_| sled::transaction::ConflictableTransactionError::Abort(()))?;
                tx.insert(row_key, approved_bytes)?;

                let mut rejected_ids = Vec::new();
                for sibling_id in &siblings {
                    let sib_key = creation_row_key(*sibling_id);
                    if let Some(sib_bytes) = tx.get(&sib_key)? {
                        if let Ok(mut sibling) = serde_json::from_slice::<Creation>(&sib_bytes) {
                            sibling.approval_status = content_core::types::ApprovalStatus::Rejected;
                            if let Ok(bytes) = serde_json::to_vec(&sibling) {
                                tx.insert(sib_key, bytes)?;
                                rejected_ids.push(*sibling_id);
                            }
                        }
                    }
                }
                Ok(rejected_ids)
            })
            .map_err(|e: sled::transaction::TransactionError<()>| {
                store_err(format!("select_variant transaction failed: {e:?}"))
            })?;

        Ok(SelectVariantOutcome {
            approved_id: creation_id,
            rejected_ids: outcome,
        })
    }

    /// Reject every creation in a variant group, including the named one.
    pub fn reject_variant_group(&self, creation_id: Id) -> CoreResult<Vec<Id>> {
        let creation = self
            .get_creation(creation_id)?
            .ok_or_else(|| CoreError::NotFound(format!("creation {creation_id}")))?;
        let mut all_ids = vec![creation_id];
        if let Some(group) = &creation.variant_group {
            for sibling in self.variant_group_members(group)? {
                if sibling != creation_id {
                    all_ids.push(sibling);
                }
            }
        }
        for id in &all_ids {
            self.mutate_creation(*id, |c| {
                c.approval_status = content_core::types::ApprovalStatus::Rejected;
            })?;
        }
        Ok(all_ids)
    }

    // -------------------------------------------------------------- Publication

    pub fn insert_publication(&self, mut publication: Publication) -> CoreResult<Id> {
        let idx_key = creation_platform_key(publication.creation_id, &publication.platform);
        if self
            .publications_by_creation_platform
            .get(&idx_key)
            .map_err(store_err)?
            .is_some()
        {
            return Err(CoreError::Invariant(format!(
                "publication already exists for creation {} on {}",
                publication.creation_id, publication.platform
            )));
        }
        let id = self.next_id()?;
        publication.id = id;
        self.publications
            .insert(id_key(id), to_bytes(&publication)?)
            .map_err(store_err)?;
        self.publications_by_creation_platform
            .insert(idx_key, id_key(id).to_vec())
            .map_err(store_err)?;
        Ok(id)
    }

    pub fn get_publication(&self, id: Id) -> CoreResult<Option<Publication>> {
        match self.publications.get(id_key(id)).map_err(store_err)? {
            Some(bytes) => Ok(Some(from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn publications_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CoreResult<Vec<Publication>> {
        let mut out = Vec::new();
        for entry in self.publications.iter() {
            let (_, bytes) = entry.map_err(store_err)?;
            let publication: Publication = from_bytes(&bytes)?;
            if publication.published_at >= start && publication.published_at <= end {
                out.push(publication);
            }
        }
        Ok(out)
    }

    pub fn all_publications(&self) -> CoreResult<Vec<Publication>> {
        let mut out = Vec::new();
        for entry in self.publications.iter() {
            let (_, bytes) = entry.map_err(store_err)?;
            out.push(from_bytes(&bytes)?);
        }
        Ok(out)
    }

    // ------------------------------------------------------------------- Metric

    pub fn metric_exists(&self, publication_id: Id, interval: MetricInterval) -> CoreResult<bool> {
        let key = pub_interval_key(publication_id, interval.label());
        Ok(self.metrics_by_pub_interval.get(key).map_err(store_err)?.is_some())
    }

    /// Append-only: refuses to write a second row for the same
    /// `(publication_id, interval)` pair (testable property 4).
    pub fn insert_metric(&self, mut metric: Metric) -> CoreResult<Id> {
        let idx_key = pub_interval_key(metric.publication_id, metric.interval.label());
        if self.metrics_by_pub_interval.get(&idx_key).map_err(store_err)?.is_some() {
            return Err(CoreError::Invariant(format!(
                "metric already recorded for publication {} interval {}",
                metric.publication_id,
                metric.interval.label()
            )));
        }
        let id = self.next_id()?;
        metric.id = id;
        self.metrics.insert(id_key(id), to_bytes(&metric)?).map_err(store_err)?;
        self.metrics_by_pub_interval
            .insert(idx_key, id_key(id).to_vec())
            .map_err(store_err)?;
        Ok(id)
    }

    pub fn metrics_by_publication(&self, publication_id: Id) -> CoreResult<Vec<Metric>> {
        let mut out = Vec::new();
        for entry in self.metrics.iter() {
            let (_, bytes) = entry.map_err(store_err)?;
            let metric: Metric = from_bytes(&bytes)?;
            if metric.publication_id == publication_id {
                out.push(metric);
            }
        }
        out.sort_by_key(|m| m.interval);
        Ok(out)
    }

    pub fn all_metrics(&self) -> CoreResult<Vec<Metric>> {
        let mut out = Vec::new();
        for entry in self.metrics.iter() {
            let (_, bytes) = entry.map_err(store_err)?;
            out.push(from_bytes(&bytes)?);
        }
        Ok(out)
    }

    // -------------------------------------------------------------------- Skill

    pub fn upsert_skill(&self, skill: &Skill) -> CoreResult<()> {
        self.skills
            .insert(skill.name.as_bytes(), to_bytes(skill)?)
            .map_err(store_err)?;
        Ok(())
    }

    pub fn get_skill(&self, name: &str) -> CoreResult<Option<Skill>> {
        match self.skills.get(name.as_bytes()).map_err(store_err)? {
            Some(bytes) => Ok(Some(from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn all_skills(&self) -> CoreResult<Vec<Skill>> {
        let mut out = Vec::new();
        for entry in self.skills.iter() {
            let (_, bytes) = entry.map_err(store_err)?;
            out.push(from_bytes(&bytes)?);
        }
        Ok(out)
    }

    pub fn insert_skill_metric(&self, mut metric: SkillMetric) -> CoreResult<Id> {
        let id = self.next_id()?;
        metric.id = id;
        let key = skill_metric_key(&metric.skill_name, metric.recorded_at.timestamp_millis(), id);
        self.skill_metrics.insert(key, to_bytes(&metric)?).map_err(store_err)?;
        Ok(id)
    }

    /// Chronological history for one skill, oldest first.
    pub fn skill_metrics_by_skill(&self, skill_name: &str) -> CoreResult<Vec<SkillMetric>> {
        let mut out = Vec::new();
        let prefix = skill_metric_prefix(skill_name);
        for entry in self.skill_metrics.scan_prefix(prefix) {
            let (_, bytes) = entry.map_err(store_err)?;
            out.push(from_bytes(&bytes)?);
        }
        Ok(out)
    }

    pub fn all_skill_metrics(&self) -> CoreResult<Vec<SkillMetric>> {
        let mut out = Vec::new();
        for entry in self.skill_metrics.iter() {
            let (_, bytes) = entry.map_err(store_err)?;
            out.push(from_bytes(&bytes)?);
        }
        Ok(out)
    }

    pub fn record_skill_interaction(&self, a: &str, b: &str, score: f64, at: DateTime<Utc>) -> CoreResult<()> {
        let (lo, hi) = SkillInteraction::pair_key(a, b);
        let key = interaction_key(&lo, &hi);
        let mut interaction = match self.skill_interactions.get(&key).map_err(store_err)? {
            Some(bytes) => from_bytes(&bytes)?,
            None => SkillInteraction {
                skill_a: lo,
                skill_b: hi,
                co_occurrences: 0,
                avg_combined_score: 0.0,
                recorded_at: at,
            },
        };
        let n = interaction.co_occurrences as f64;
        interaction.avg_combined_score = (interaction.avg_combined_score * n + score) / (n + 1.0);
        interaction.co_occurrences += 1;
        interaction.recorded_at = at;
        self.skill_interactions
            .insert(key, to_bytes(&interaction)?)
            .map_err(store_err)?;
        Ok(())
    }

    pub fn all_skill_interactions(&self) -> CoreResult<Vec<SkillInteraction>> {
        let mut out = Vec::new();
        for entry in self.skill_interactions.iter() {
            let (_, bytes) = entry.map_err(store_err)?;
            out.push(from_bytes(&bytes)?);
        }
        Ok(out)
    }

    // -------------------------------------------------------------- Experiment

    pub fn insert_experiment(&self, mut experiment: Experiment) -> CoreResult<Id> {
        let id = self.next_id()?;
        experiment.id = id;
        self.experiments
            .insert(id_key(id), to_bytes(&experiment)?)
            .map_err(store_err)?;
        Ok(id)
    }

    pub fn get_experiment(&self, id: Id) -> CoreResult<Option<Experiment>> {
        match self.experiments.get(id_key(id)).map_err(store_err)? {
            Some(bytes) => Ok(Some(from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn mutate_experiment<F>(&self, id: Id, f: F) -> CoreResult<Experiment>
    where
        F: FnOnce(&mut Experiment),
    {
        let mut experiment = self
            .get_experiment(id)?
            .ok_or_else(|| CoreError::NotFound(format!("experiment {id}")))?;
        f(&mut experiment);
        self.experiments
            .insert(id_key(id), to_bytes(&experiment)?)
            .map_err(store_err)?;
        Ok(experiment)
    }

    pub fn experiments_by_status(&self, status: ExperimentStatus) -> CoreResult<Vec<Experiment>> {
        let mut out = Vec::new();
        for entry in self.experiments.iter() {
            let (_, bytes) = entry.map_err(store_err)?;
            let experiment: Experiment = from_bytes(&bytes)?;
            if experiment.status == status {
                out.push(experiment);
            }
        }
        Ok(out)
    }

    // --------------------------------------------------------------- AgentRun

    pub fn insert_agent_run(&self, mut run: AgentRun) -> CoreResult<Id> {
        let id = self.next_id()?;
        run.id = id;
        self.agent_runs.insert(id_key(id), to_bytes(&run)?).map_err(store_err)?;
        Ok(id)
    }

    /// Sum of `estimated_cost_usd` for runs started at or after `since` —
    /// the numerator of the Orchestrator's daily cost ratio.
    pub fn cost_since(&self, since: DateTime<Utc>) -> CoreResult<f64> {
        let mut total = 0.0;
        for entry in self.agent_runs.iter() {
            let (_, bytes) = entry.map_err(store_err)?;
            let run: AgentRun = from_bytes(&bytes)?;
            if run.started_at >= since {
                total += run.estimated_cost_usd;
            }
        }
        Ok(total)
    }

    pub fn flush(&self) -> CoreResult<()> {
        self.db.flush().map_err(store_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_core::types::{ApprovalStatus, MediaAsset};

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (dir, store)
    }

    fn sample_item(title: &str, url: &str) -> DiscoveryItem {
        DiscoveryItem {
            source: "hackernews".into(),
            source_id: "1".into(),
            title: title.into(),
            url: url.into(),
            raw_score: 100.0,
            raw_data: serde_json::json!({}),
            discovered_at: Utc::now(),
        }
    }

    #[test]
    fn dedup_by_content_hash() {
        let (_dir, store) = temp_store();
        let (id1, inserted1) = store.insert_discovery_if_new(sample_item("X", "https://x")).unwrap();
        assert!(inserted1);
        let (id2, inserted2) = store.insert_discovery_if_new(sample_item("X", "https://x")).unwrap();
        assert!(!inserted2);
        assert_eq!(id1, id2);
    }

    fn sample_creation(discovery_id: Id, group: Option<&str>, label: Option<&str>) -> Creation {
        Creation {
            id: 0,
            discovery_id,
            platform: "linkedin".into(),
            format: "post".into(),
            title: "t".into(),
            body: "b".into(),
            media_urls: vec![MediaAsset::Image { url: "img".into() }],
            skills_used: vec![],
            risk_score: None,
            risk_flags: vec![],
            quality_score: None,
            quality_issues: vec![],
            variant_group: group.map(|s| s.to_string()),
            variant_label: label.map(|s| s.to_string()),
            approval_status: ApprovalStatus::PendingReview,
            video: Default::default(),
            created_at: Utc::now(),
            approved_at: None,
        }
    }

    #[test]
    fn select_variant_rejects_siblings() {
        let (_dir, store) = temp_store();
        let a = store.insert_creation(sample_creation(1, Some("g1"), Some("A"))).unwrap();
        let b = store.insert_creation(sample_creation(1, Some("g1"), Some("B"))).unwrap();

        let outcome = store.select_variant(a, Utc::now()).unwrap();
        assert_eq!(outcome.approved_id, a);
        assert_eq!(outcome.rejected_ids, vec![b]);

        let a_row = store.get_creation(a).unwrap().unwrap();
        let b_row = store.get_creation(b).unwrap().unwrap();
        assert_eq!(a_row.approval_status, ApprovalStatus::Approved);
        assert_eq!(b_row.approval_status, ApprovalStatus::Rejected);
    }

    #[test]
    fn metric_uniqueness_per_publication_interval() {
        let (_dir, store) = temp_store();
        let pub_id = store
            .insert_publication(Publication {
                id: 0,
                creation_id: 1,
                platform: "linkedin".into(),
                platform_post_id: "p1".into(),
                platform_url: None,
                arbitrage_window_minutes: None,
                published_at: Utc::now(),
            })
            .unwrap();
        let metric = Metric {
            id: 0,
            publication_id: pub_id,
            interval: MetricInterval::H24,
            snapshot: Default::default(),
            collected_at: Utc::now(),
        };
        store.insert_metric(metric.clone()).unwrap();
        assert!(store.insert_metric(metric).is_err());
    }
}
