//! Folio service
//!
//! Wires the reconciler, propagation controller, projector and rollover
//! planner to a [`DocumentStore`]. Structural saves for one template are
//! serialized by an async mutex per template id and the store write is
//! additionally conditional on the revision read inside the lock.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use dashmap::DashMap;
use folio_identity::{IdMinter, Reconciler, UlidMinter};
use folio_lifecycle::{RolloverPlanner, SeedTarget, TemplateChoice};
use folio_model::{
    validate_pages, CycleId, Instance, InstanceData, InstanceId, SubjectId, Template, TemplateId,
};
use folio_projection::{CacheStats, MaterializedView, ProjectionCache, Projector};
use folio_versioning::{ChangeKind, PropagationController, SaveOutcome, StructuralEdit};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::FolioConfig;
use crate::error::{FolioError, FolioResult, StoreError};
use crate::store::{DocumentStore, DuplicateGroup, InstanceFilter, SettingsStore};

/// Attempts `ensure_instance` makes before surfacing a conflict
pub const ENSURE_ATTEMPTS: u32 = 3;

/// Request to make sure a live instance exists for (template, subject)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsureInstance {
    pub template: TemplateId,
    pub subject: SubjectId,
    pub cycle: CycleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Data for a new instance; on an existing one only missing keys are added
    #[serde(default)]
    pub seed: InstanceData,
}

impl EnsureInstance {
    /// Create request without level or seed
    #[must_use]
    pub fn new(template: TemplateId, subject: SubjectId, cycle: CycleId) -> Self {
        Self {
            template,
            subject,
            cycle,
            level: None,
            seed: InstanceData::new(),
        }
    }

    /// With level
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// With seed data
    #[must_use]
    pub fn with_seed(mut self, seed: InstanceData) -> Self {
        self.seed = seed;
        self
    }
}

/// Request to open a new cycle for a subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloverRequest {
    pub subject: SubjectId,
    pub level: String,
    pub cycle: CycleId,
}

impl RolloverRequest {
    /// Create request
    #[must_use]
    pub fn new(subject: SubjectId, level: impl Into<String>, cycle: CycleId) -> Self {
        Self {
            subject,
            level: level.into(),
            cycle,
        }
    }
}

/// What a rollover did
#[derive(Debug, Clone, PartialEq)]
pub struct RolloverOutcome {
    pub choice: TemplateChoice,
    /// Previous-cycle instances archived
    pub archived: usize,
    /// Live instances of the new cycle, one per chosen template
    pub instances: Vec<Instance>,
    /// Keys carried into the seed
    pub long_term: BTreeSet<String>,
    /// Blacklisted keys removed from the seed
    pub stripped: Vec<String>,
}

/// Result of a `propagate` or `rollback`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepointOutcome {
    pub template: TemplateId,
    pub version: u32,
    pub repointed: usize,
}

/// Store health findings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    /// (template, subject) pairs with more than one live instance
    pub duplicates: Vec<DuplicateGroup>,
}

impl IntegrityReport {
    /// Whether nothing was found
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty()
    }
}

/// Template and instance operations over a document store
pub struct FolioService {
    config: FolioConfig,
    documents: Arc<dyn DocumentStore>,
    settings: Arc<dyn SettingsStore>,
    minter: Arc<dyn IdMinter>,
    controller: PropagationController,
    projector: Projector,
    cache: ProjectionCache,
    planner: RolloverPlanner,
    locks: DashMap<TemplateId, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for FolioService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolioService")
            .field("config", &self.config)
            .field("cache", &self.cache.stats())
            .field("locks", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl FolioService {
    /// Create service over separate document and settings stores
    #[must_use]
    pub fn new(
        config: FolioConfig,
        documents: Arc<dyn DocumentStore>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        let cache = match config.cache.ttl() {
            Some(ttl) => ProjectionCache::with_ttl(config.cache.capacity, ttl),
            None => ProjectionCache::new(config.cache.capacity),
        };
        Self {
            planner: RolloverPlanner::new(config.inference.clone()),
            config,
            documents,
            settings,
            minter: Arc::new(UlidMinter),
            controller: PropagationController::new(),
            projector: Projector::new(),
            cache,
            locks: DashMap::new(),
        }
    }

    /// Create service over one store implementing both interfaces
    #[must_use]
    pub fn with_store<S>(config: FolioConfig, store: Arc<S>) -> Self
    where
        S: DocumentStore + SettingsStore + 'static,
    {
        Self::new(config, store.clone(), store)
    }

    /// Replace the id minter
    #[must_use]
    pub fn with_minter(mut self, minter: Arc<dyn IdMinter>) -> Self {
        self.minter = minter;
        self
    }

    /// Replace the projector
    #[must_use]
    pub fn with_projector(mut self, projector: Projector) -> Self {
        self.projector = projector;
        self
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &FolioConfig {
        &self.config
    }

    /// Projection cache statistics
    #[inline]
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Template by id
    ///
    /// # Errors
    /// Returns [`FolioError::TemplateNotFound`] or a store failure
    pub async fn template(&self, id: TemplateId) -> FolioResult<Template> {
        self.documents
            .get_template(id)
            .await?
            .ok_or(FolioError::TemplateNotFound(id))
    }

    /// Instance by id
    ///
    /// # Errors
    /// Returns [`FolioError::InstanceNotFound`] or a store failure
    pub async fn instance(&self, id: InstanceId) -> FolioResult<Instance> {
        self.documents
            .get_instance(id)
            .await?
            .ok_or(FolioError::InstanceNotFound(id))
    }

    /// Instances matching a filter
    ///
    /// # Errors
    /// Returns a store failure
    pub async fn instances(&self, filter: &InstanceFilter) -> FolioResult<Vec<Instance>> {
        Ok(self.documents.find_instances(filter).await?)
    }

    /// Store a new template, assigning ids to every block and row
    ///
    /// # Errors
    /// Returns error if the structure is malformed or the store fails
    pub async fn create_template(&self, mut draft: Template) -> FolioResult<Template> {
        validate_pages(&draft.pages, &self.config.structural_limits)?;
        let pages = std::mem::take(&mut draft.pages);
        draft.pages = self.reconciler().reconcile(&[], pages).pages;
        self.documents.insert_template(draft.clone()).await?;
        tracing::info!(template = %draft.id, title = %draft.title, "created template");
        Ok(draft)
    }

    /// Save a new structure for a template
    ///
    /// Ids are reconciled against the live structure, a version is minted
    /// when the change is structural and instances reference the template,
    /// and the targeted live instances advance to it. Instances are repointed
    /// before the template is committed; when the commit fails they are moved
    /// back, and any that could not be are left for [`FolioService::propagate`].
    ///
    /// # Errors
    /// Returns error if the payload is malformed, the template is unknown,
    /// the conditional update loses or the store fails
    pub async fn save_structure(
        &self,
        id: TemplateId,
        mut edit: StructuralEdit,
    ) -> FolioResult<SaveOutcome> {
        validate_pages(&edit.pages, &self.config.structural_limits)?;

        let lock = self.template_lock(id);
        let _guard = lock.lock().await;

        let mut template = self.template(id).await?;
        let pages = std::mem::take(&mut edit.pages);
        edit.pages = self.reconciler().reconcile(&template.pages, pages).pages;

        let referencing = self
            .documents
            .count_instances(&InstanceFilter::new().template(id))
            .await?;
        let plan = self.controller.plan(&template, &edit, referencing)?;
        let live = if plan.mints() {
            self.documents
                .find_instances(&InstanceFilter::new().template(id).live())
                .await?
        } else {
            Vec::new()
        };
        let candidates: Vec<InstanceId> = live.iter().map(|i| i.id).collect();

        let outcome = self
            .controller
            .apply(&mut template, edit, &plan, candidates)?;

        // instances move before the template commits, so a failed repoint
        // leaves the stored template untouched and the same save can be resent
        let repointed = match outcome.minted {
            Some(version) if !outcome.advanced.is_empty() => {
                let filter = InstanceFilter::new()
                    .template(id)
                    .ids(outcome.advanced.iter().copied());
                self.documents.repoint_instances(&filter, version).await?;
                true
            }
            _ => false,
        };
        if let Err(e) = self
            .documents
            .update_template(template, plan.base_revision)
            .await
        {
            if repointed {
                self.restore_versions(id, &live, &outcome.advanced).await;
            }
            return Err(e.into());
        }
        if outcome.change == ChangeKind::Structural {
            self.cache.invalidate_template(id)?;
        }

        tracing::info!(
            template = %id,
            change = ?outcome.change,
            previous = outcome.previous_version,
            current = outcome.current_version,
            advanced = outcome.advanced.len(),
            "saved template structure"
        );
        Ok(outcome)
    }

    /// Put advanced instances back on the versions they had before a save
    /// whose template commit failed; failures are logged and left to
    /// [`FolioService::propagate`] or [`FolioService::rollback`]
    async fn restore_versions(
        &self,
        id: TemplateId,
        before: &[Instance],
        advanced: &BTreeSet<InstanceId>,
    ) {
        let mut by_version: BTreeMap<u32, Vec<InstanceId>> = BTreeMap::new();
        for instance in before.iter().filter(|i| advanced.contains(&i.id)) {
            by_version
                .entry(instance.template_version)
                .or_default()
                .push(instance.id);
        }
        for (version, ids) in by_version {
            let count = ids.len();
            let filter = InstanceFilter::new().template(id).ids(ids);
            if let Err(e) = self.documents.repoint_instances(&filter, version).await {
                tracing::warn!(
                    template = %id,
                    version,
                    instances = count,
                    error = %e,
                    "could not restore instance versions after a failed save"
                );
            }
        }
    }

    /// Advance an explicit instance set to `version`
    ///
    /// Also the recovery path for instances a failed save could not move
    /// back to their previous version.
    ///
    /// # Errors
    /// Returns [`folio_versioning::VersionError::VersionNotFound`] for an
    /// unknown version; nothing is touched in that case
    pub async fn propagate(
        &self,
        id: TemplateId,
        version: u32,
        instances: BTreeSet<InstanceId>,
    ) -> FolioResult<RepointOutcome> {
        self.repoint(id, version, instances, "propagated").await
    }

    /// Pin an explicit instance set back to an earlier `version`
    ///
    /// # Errors
    /// Same as [`FolioService::propagate`]
    pub async fn rollback(
        &self,
        id: TemplateId,
        version: u32,
        instances: BTreeSet<InstanceId>,
    ) -> FolioResult<RepointOutcome> {
        self.repoint(id, version, instances, "rolled back").await
    }

    async fn repoint(
        &self,
        id: TemplateId,
        version: u32,
        instances: BTreeSet<InstanceId>,
        action: &'static str,
    ) -> FolioResult<RepointOutcome> {
        let lock = self.template_lock(id);
        let _guard = lock.lock().await;

        let template = self.template(id).await?;
        let plan = self.controller.repoint(&template, version, instances)?;

        let found = self
            .documents
            .find_instances(&InstanceFilter::new().ids(plan.instances.iter().copied()))
            .await?;
        if let Some(missing) = plan
            .instances
            .iter()
            .find(|wanted| !found.iter().any(|i| i.id == **wanted))
        {
            return Err(FolioError::InstanceNotFound(*missing));
        }
        if let Some(foreign) = found.iter().find(|i| i.template_id != id) {
            return Err(FolioError::ForeignInstance {
                instance: foreign.id,
                expected: id,
                actual: foreign.template_id,
            });
        }

        let repointed = if plan.instances.is_empty() {
            0
        } else {
            let filter = InstanceFilter::new()
                .template(id)
                .ids(plan.instances.iter().copied());
            self.documents.repoint_instances(&filter, version).await?
        };

        tracing::info!(template = %id, version, repointed, "{action} instances");
        Ok(RepointOutcome {
            template: id,
            version,
            repointed,
        })
    }

    /// Create the live instance for (template, subject) or update the existing one
    ///
    /// A concurrent or repeated call finds the existing instance through the
    /// store's uniqueness check; its level is updated and seed keys it lacks
    /// are added with a conditional write. A data write that lands between
    /// the read and that merge causes one more attempt, and an instance
    /// archived in that window frees the pair for a fresh insert.
    ///
    /// # Errors
    /// Returns error if the template is unknown, the seed is invalid, the
    /// instance keeps changing across [`ENSURE_ATTEMPTS`] attempts or the
    /// store fails
    pub async fn ensure_instance(&self, request: EnsureInstance) -> FolioResult<Instance> {
        request.seed.validate(&self.config.data_limits)?;
        let template = self.template(request.template).await?;

        let mut attempt = 1;
        loop {
            let err = match self.insert_or_merge(&template, &request).await {
                Ok(instance) => return Ok(instance),
                Err(err) => err,
            };
            let retryable = matches!(
                err,
                StoreError::DataConflict { .. } | StoreError::Archived(_)
            );
            if !retryable || attempt >= ENSURE_ATTEMPTS {
                return Err(err.into());
            }
            tracing::debug!(
                template = %template.id,
                subject = %request.subject,
                attempt,
                error = %err,
                "existing instance changed underneath ensure, retrying"
            );
            attempt += 1;
        }
    }

    async fn insert_or_merge(
        &self,
        template: &Template,
        request: &EnsureInstance,
    ) -> Result<Instance, StoreError> {
        let mut instance = Instance::new(template, request.subject.clone(), request.cycle.clone())
            .with_data(request.seed.clone());
        instance.level.clone_from(&request.level);

        match self.documents.insert_instance(instance.clone()).await {
            Ok(()) => {
                tracing::info!(
                    instance = %instance.id,
                    template = %template.id,
                    subject = %instance.subject_id,
                    version = instance.template_version,
                    "created instance"
                );
                Ok(instance)
            }
            Err(StoreError::DuplicateInstance { existing, .. }) => {
                tracing::warn!(
                    instance = %existing,
                    template = %template.id,
                    subject = %request.subject,
                    "live instance already exists, updating it"
                );
                let current = self
                    .documents
                    .get_instance(existing)
                    .await?
                    .ok_or_else(|| StoreError::not_found("instance", existing))?;
                self.documents
                    .merge_missing_keys(
                        existing,
                        &request.seed,
                        request.level.clone(),
                        current.data_version,
                    )
                    .await
            }
            Err(e) => Err(e),
        }
    }

    /// Merge a data patch into a live instance
    ///
    /// `null` values delete keys. `expected_version` is the `data_version`
    /// the caller last read.
    ///
    /// # Errors
    /// Returns a data validation error, [`StoreError::Archived`] for
    /// archived instances or [`StoreError::DataConflict`] for a stale version
    pub async fn write_data(
        &self,
        id: InstanceId,
        patch: InstanceData,
        expected_version: u64,
    ) -> FolioResult<Instance> {
        patch.validate(&self.config.data_limits)?;
        let instance = self.instance(id).await?;
        if !instance.is_live() {
            return Err(StoreError::Archived(id).into());
        }
        let merged = instance.data.merged(&patch);
        let updated = self
            .documents
            .update_instance_data(id, merged, expected_version)
            .await?;
        tracing::debug!(instance = %id, data_version = updated.data_version, keys = patch.len(), "wrote instance data");
        Ok(updated)
    }

    /// Materialized view of an instance at its pinned version
    ///
    /// # Errors
    /// Returns error if the instance or its template is unknown
    pub async fn render(&self, id: InstanceId) -> FolioResult<Arc<MaterializedView>> {
        let instance = self.instance(id).await?;
        let template = self.template(instance.template_id).await?;
        Ok(self
            .cache
            .get_or_project(&template, &instance, &self.projector)
            .await?)
    }

    /// Open a new cycle for a subject
    ///
    /// Previous-cycle live instances are archived and one live instance per
    /// chosen template is ensured, seeded with the sanitized long-term data.
    ///
    /// # Errors
    /// Returns [`FolioError::NoTemplateChoice`] before any mutation when no
    /// sibling or default template exists
    pub async fn roll_over(&self, request: RolloverRequest) -> FolioResult<RolloverOutcome> {
        let allowlist = self.allowlist().await?;
        let history = self
            .documents
            .find_instances(&InstanceFilter::new().subject(request.subject.clone()))
            .await?;
        let candidates = self
            .documents
            .find_instances(
                &InstanceFilter::new()
                    .cycle(request.cycle.clone())
                    .level(request.level.clone())
                    .live(),
            )
            .await?;
        let templates = self.documents.list_templates().await?;

        let target = SeedTarget::new(request.subject, request.level, request.cycle);
        let plan = self
            .planner
            .plan(target, &history, &candidates, &templates, &allowlist)?;
        if plan.choice == TemplateChoice::Unresolved {
            return Err(FolioError::NoTemplateChoice(plan.target.level));
        }

        let archived = if plan.archive.is_empty() {
            0
        } else {
            self.documents
                .archive_instances(&InstanceFilter::new().ids(plan.archive.iter().copied()))
                .await?
        };

        let mut instances = Vec::with_capacity(plan.choice.templates().len());
        for template in plan.choice.templates() {
            let request = EnsureInstance::new(
                *template,
                plan.target.subject.clone(),
                plan.target.cycle.clone(),
            )
            .with_level(plan.target.level.clone())
            .with_seed(plan.seed.data.clone());
            instances.push(self.ensure_instance(request).await?);
        }

        tracing::info!(
            subject = %plan.target.subject,
            cycle = %plan.target.cycle,
            archived,
            created = instances.len(),
            "rolled over subject"
        );
        Ok(RolloverOutcome {
            choice: plan.choice,
            archived,
            instances,
            long_term: plan.inference.long_term,
            stripped: plan.seed.stripped,
        })
    }

    /// Scan the store for integrity problems
    ///
    /// # Errors
    /// Returns a store failure
    pub async fn integrity_report(&self) -> FolioResult<IntegrityReport> {
        let duplicates = self.documents.find_duplicates().await?;
        if !duplicates.is_empty() {
            tracing::warn!(groups = duplicates.len(), "duplicate live instances found");
        }
        Ok(IntegrityReport { duplicates })
    }

    async fn allowlist(&self) -> FolioResult<BTreeSet<String>> {
        let key = self.config.allowlist_key.as_str();
        let Some(value) = self.settings.get_setting(key).await? else {
            return Ok(BTreeSet::new());
        };
        match serde_json::from_value::<BTreeSet<String>>(value) {
            Ok(keys) => Ok(keys),
            Err(e) => {
                tracing::warn!(setting = key, error = %e, "ignoring malformed allowlist");
                Ok(BTreeSet::new())
            }
        }
    }

    fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(self.minter.as_ref()).with_options(self.config.signature)
    }

    fn template_lock(&self, id: TemplateId) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_default().clone()
    }
}
