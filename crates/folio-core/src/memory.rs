//! In-memory document and settings store
//!
//! Every operation runs under one short `parking_lot` lock, so each call is
//! atomic: uniqueness checks, conditional updates and bulk updates cannot
//! interleave with other writers.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use folio_model::{Instance, InstanceData, InstanceId, InstanceStatus, SubjectId, Template, TemplateId};
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::StoreError;
use crate::store::{DocumentStore, DuplicateGroup, InstanceFilter, SettingsStore};

/// Process-local store for tests and the CLI
#[derive(Debug)]
pub struct MemoryStore {
    templates: RwLock<HashMap<TemplateId, Template>>,
    instances: RwLock<BTreeMap<InstanceId, Instance>>,
    settings: RwLock<HashMap<String, Value>>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
            instances: RwLock::new(BTreeMap::new()),
            settings: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate backend outage; every call fails while unavailable
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Write a setting
    pub fn set_setting(&self, key: impl Into<String>, value: Value) {
        self.settings.write().insert(key.into(), value);
    }

    /// Load instances without the uniqueness check (legacy data imports)
    pub fn import_instances(&self, instances: impl IntoIterator<Item = Instance>) {
        let mut guard = self.instances.write();
        for instance in instances {
            guard.insert(instance.id, instance);
        }
    }

    /// Load templates as stored
    pub fn import_templates(&self, templates: impl IntoIterator<Item = Template>) {
        let mut guard = self.templates.write();
        for template in templates {
            guard.insert(template.id, template);
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store switched off".to_string()))
        }
    }
}

fn sorted(mut instances: Vec<Instance>) -> Vec<Instance> {
    instances.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    instances
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_template(&self, id: TemplateId) -> Result<Option<Template>, StoreError> {
        self.check_available()?;
        Ok(self.templates.read().get(&id).cloned())
    }

    async fn list_templates(&self) -> Result<Vec<Template>, StoreError> {
        self.check_available()?;
        let mut templates: Vec<Template> = self.templates.read().values().cloned().collect();
        templates.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(templates)
    }

    async fn insert_template(&self, template: Template) -> Result<(), StoreError> {
        self.check_available()?;
        self.templates.write().insert(template.id, template);
        Ok(())
    }

    async fn update_template(
        &self,
        template: Template,
        expected_revision: u64,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let mut guard = self.templates.write();
        let stored = guard
            .get_mut(&template.id)
            .ok_or_else(|| StoreError::not_found("template", template.id))?;
        if stored.revision != expected_revision {
            return Err(StoreError::TemplateConflict {
                template: template.id,
                expected: expected_revision,
                stored: stored.revision,
            });
        }
        *stored = template;
        Ok(())
    }

    async fn get_instance(&self, id: InstanceId) -> Result<Option<Instance>, StoreError> {
        self.check_available()?;
        Ok(self.instances.read().get(&id).cloned())
    }

    async fn find_instances(&self, filter: &InstanceFilter) -> Result<Vec<Instance>, StoreError> {
        self.check_available()?;
        let found = self
            .instances
            .read()
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        Ok(sorted(found))
    }

    async fn count_instances(&self, filter: &InstanceFilter) -> Result<usize, StoreError> {
        self.check_available()?;
        Ok(self.instances.read().values().filter(|i| filter.matches(i)).count())
    }

    async fn insert_instance(&self, instance: Instance) -> Result<(), StoreError> {
        self.check_available()?;
        let mut guard = self.instances.write();
        if instance.is_live() {
            if let Some(existing) = guard.values().find(|i| {
                i.is_live()
                    && i.template_id == instance.template_id
                    && i.subject_id == instance.subject_id
            }) {
                return Err(StoreError::DuplicateInstance {
                    template: instance.template_id,
                    subject: instance.subject_id.clone(),
                    existing: existing.id,
                });
            }
        }
        guard.insert(instance.id, instance);
        Ok(())
    }

    async fn update_instance_data(
        &self,
        id: InstanceId,
        data: InstanceData,
        expected_version: u64,
    ) -> Result<Instance, StoreError> {
        self.check_available()?;
        let mut guard = self.instances.write();
        let stored = guard
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("instance", id))?;
        if stored.status == InstanceStatus::Archived {
            return Err(StoreError::Archived(id));
        }
        if stored.data_version != expected_version {
            return Err(StoreError::DataConflict {
                instance: id,
                expected: expected_version,
                stored: stored.data_version,
            });
        }
        stored.data = data;
        stored.data_version += 1;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn merge_missing_keys(
        &self,
        id: InstanceId,
        seed: &InstanceData,
        level: Option<String>,
        expected_version: u64,
    ) -> Result<Instance, StoreError> {
        self.check_available()?;
        let mut guard = self.instances.write();
        let stored = guard
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("instance", id))?;
        if stored.status == InstanceStatus::Archived {
            return Err(StoreError::Archived(id));
        }
        if stored.data_version != expected_version {
            return Err(StoreError::DataConflict {
                instance: id,
                expected: expected_version,
                stored: stored.data_version,
            });
        }
        let mut added = false;
        for (key, value) in seed.iter() {
            if !stored.data.contains_key(key) {
                stored.data.insert(key, value.clone());
                added = true;
            }
        }
        if added {
            stored.data_version += 1;
        }
        if level.is_some() {
            stored.level = level;
        }
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn repoint_instances(
        &self,
        filter: &InstanceFilter,
        version: u32,
    ) -> Result<usize, StoreError> {
        self.check_available()?;
        let now = Utc::now();
        let mut count = 0;
        for instance in self.instances.write().values_mut().filter(|i| filter.matches(i)) {
            instance.template_version = version;
            instance.updated_at = now;
            count += 1;
        }
        Ok(count)
    }

    async fn archive_instances(&self, filter: &InstanceFilter) -> Result<usize, StoreError> {
        self.check_available()?;
        let now = Utc::now();
        let mut count = 0;
        for instance in self
            .instances
            .write()
            .values_mut()
            .filter(|i| i.is_live() && filter.matches(i))
        {
            instance.status = InstanceStatus::Archived;
            instance.updated_at = now;
            count += 1;
        }
        Ok(count)
    }

    async fn find_duplicates(&self) -> Result<Vec<DuplicateGroup>, StoreError> {
        self.check_available()?;
        let mut groups: BTreeMap<(TemplateId, SubjectId), Vec<InstanceId>> = BTreeMap::new();
        for instance in self.instances.read().values().filter(|i| i.is_live()) {
            groups
                .entry((instance.template_id, instance.subject_id.clone()))
                .or_default()
                .push(instance.id);
        }
        Ok(groups
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|((template, subject), instances)| DuplicateGroup {
                template,
                subject,
                instances,
            })
            .collect())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_setting(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.check_available()?;
        Ok(self.settings.read().get(key).cloned())
    }
}
