//! Persistence interfaces
//!
//! The service only needs lookups, filtered queries, inserts, conditional
//! updates, bulk updates by filter and one duplicate aggregation. Any
//! document database can back these traits; [`crate::MemoryStore`] is the
//! in-process implementation.

use std::collections::BTreeSet;

use async_trait::async_trait;
use folio_model::{
    CycleId, Instance, InstanceData, InstanceId, InstanceStatus, SubjectId, Template, TemplateId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;

/// Instance query; unset fields match anything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceFilter {
    pub template: Option<TemplateId>,
    pub subject: Option<SubjectId>,
    pub cycle: Option<CycleId>,
    pub level: Option<String>,
    pub status: Option<InstanceStatus>,
    pub ids: Option<BTreeSet<InstanceId>>,
}

impl InstanceFilter {
    /// Match everything
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to a template
    #[inline]
    #[must_use]
    pub fn template(mut self, template: TemplateId) -> Self {
        self.template = Some(template);
        self
    }

    /// Restrict to a subject
    #[inline]
    #[must_use]
    pub fn subject(mut self, subject: SubjectId) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Restrict to a cycle
    #[inline]
    #[must_use]
    pub fn cycle(mut self, cycle: CycleId) -> Self {
        self.cycle = Some(cycle);
        self
    }

    /// Restrict to a level
    #[inline]
    #[must_use]
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Restrict to live instances
    #[inline]
    #[must_use]
    pub fn live(mut self) -> Self {
        self.status = Some(InstanceStatus::Live);
        self
    }

    /// Restrict to an explicit id set
    #[inline]
    #[must_use]
    pub fn ids(mut self, ids: impl IntoIterator<Item = InstanceId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    /// Whether the instance matches
    #[must_use]
    pub fn matches(&self, instance: &Instance) -> bool {
        self.template.map_or(true, |t| instance.template_id == t)
            && self.subject.as_ref().map_or(true, |s| &instance.subject_id == s)
            && self.cycle.as_ref().map_or(true, |c| &instance.cycle == c)
            && self
                .level
                .as_ref()
                .map_or(true, |l| instance.level.as_ref() == Some(l))
            && self.status.map_or(true, |s| instance.status == s)
            && self.ids.as_ref().map_or(true, |ids| ids.contains(&instance.id))
    }
}

/// Live instances sharing one (template, subject) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub template: TemplateId,
    pub subject: SubjectId,
    pub instances: Vec<InstanceId>,
}

/// Template and instance persistence
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Template by id
    async fn get_template(&self, id: TemplateId) -> Result<Option<Template>, StoreError>;

    /// All templates
    async fn list_templates(&self) -> Result<Vec<Template>, StoreError>;

    /// Insert a new template
    async fn insert_template(&self, template: Template) -> Result<(), StoreError>;

    /// Replace a template iff its stored revision equals `expected_revision`
    async fn update_template(
        &self,
        template: Template,
        expected_revision: u64,
    ) -> Result<(), StoreError>;

    /// Instance by id
    async fn get_instance(&self, id: InstanceId) -> Result<Option<Instance>, StoreError>;

    /// Instances matching a filter, oldest first
    async fn find_instances(&self, filter: &InstanceFilter) -> Result<Vec<Instance>, StoreError>;

    /// Number of instances matching a filter
    async fn count_instances(&self, filter: &InstanceFilter) -> Result<usize, StoreError> {
        Ok(self.find_instances(filter).await?.len())
    }

    /// Insert an instance; rejects a second live instance per (template, subject)
    async fn insert_instance(&self, instance: Instance) -> Result<(), StoreError>;

    /// Replace data iff the stored `data_version` equals `expected_version`;
    /// returns the instance with its incremented version
    async fn update_instance_data(
        &self,
        id: InstanceId,
        data: InstanceData,
        expected_version: u64,
    ) -> Result<Instance, StoreError>;

    /// Add the `seed` keys the instance lacks and set `level` when given,
    /// iff the instance is live and its `data_version` equals
    /// `expected_version`; the version is incremented only if keys were added
    async fn merge_missing_keys(
        &self,
        id: InstanceId,
        seed: &InstanceData,
        level: Option<String>,
        expected_version: u64,
    ) -> Result<Instance, StoreError>;

    /// Set `template_version` on every matching instance; returns the count
    async fn repoint_instances(
        &self,
        filter: &InstanceFilter,
        version: u32,
    ) -> Result<usize, StoreError>;

    /// Archive every matching live instance; returns the count
    async fn archive_instances(&self, filter: &InstanceFilter) -> Result<usize, StoreError>;

    /// Group live instances by (template, subject) where count > 1
    async fn find_duplicates(&self) -> Result<Vec<DuplicateGroup>, StoreError>;
}

/// Admin settings
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Single setting by key
    async fn get_setting(&self, key: &str) -> Result<Option<Value>, StoreError>;
}
