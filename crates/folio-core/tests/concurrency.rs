//! Concurrent saves, data writes and instance creation, including writes
//! that land between a read and the conditional update that follows it

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use folio_core::{
    DocumentStore, DuplicateGroup, EnsureInstance, FolioConfig, FolioError, FolioService,
    InstanceFilter, MemoryStore, SettingsStore, StoreError,
};
use folio_identity::SequentialMinter;
use folio_model::{
    CycleId, Instance, InstanceData, InstanceId, InstanceStatus, SubjectId, Template, TemplateId,
};
use folio_test_utils::{data_from, live_instance, sample_pages, sample_template, text_block};
use folio_versioning::{ChangeKind, StructuralEdit};
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::{json, Value};

/// One interruption injected around a delegated store call
#[derive(Debug, Clone)]
enum Interruption {
    /// Another writer commits this data right after an instance is read
    WriteAfterRead(InstanceData),
    /// A rollover archives the instance right after it is read
    ArchiveAfterRead,
    FailRepoint,
    FailTemplateUpdate,
}

/// Memory store that fires an armed interruption once
#[derive(Default)]
struct ScriptedStore {
    inner: MemoryStore,
    armed: Mutex<Option<Interruption>>,
}

impl ScriptedStore {
    fn arm(&self, interruption: Interruption) {
        *self.armed.lock() = Some(interruption);
    }

    fn fire_if(&self, wanted: impl Fn(&Interruption) -> bool) -> Option<Interruption> {
        let mut armed = self.armed.lock();
        if armed.as_ref().is_some_and(wanted) {
            armed.take()
        } else {
            None
        }
    }
}

fn injected() -> StoreError {
    StoreError::Unavailable("injected failure".to_string())
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn get_template(&self, id: TemplateId) -> Result<Option<Template>, StoreError> {
        self.inner.get_template(id).await
    }

    async fn list_templates(&self) -> Result<Vec<Template>, StoreError> {
        self.inner.list_templates().await
    }

    async fn insert_template(&self, template: Template) -> Result<(), StoreError> {
        self.inner.insert_template(template).await
    }

    async fn update_template(
        &self,
        template: Template,
        expected_revision: u64,
    ) -> Result<(), StoreError> {
        if self
            .fire_if(|i| matches!(i, Interruption::FailTemplateUpdate))
            .is_some()
        {
            return Err(injected());
        }
        self.inner.update_template(template, expected_revision).await
    }

    async fn get_instance(&self, id: InstanceId) -> Result<Option<Instance>, StoreError> {
        let read = self.inner.get_instance(id).await?;
        let fired = self.fire_if(|i| {
            matches!(
                i,
                Interruption::WriteAfterRead(_) | Interruption::ArchiveAfterRead
            )
        });
        match (fired, &read) {
            (Some(Interruption::WriteAfterRead(data)), Some(instance)) => {
                self.inner
                    .update_instance_data(id, data, instance.data_version)
                    .await?;
            }
            (Some(Interruption::ArchiveAfterRead), Some(_)) => {
                self.inner
                    .archive_instances(&InstanceFilter::new().ids([id]))
                    .await?;
            }
            _ => {}
        }
        Ok(read)
    }

    async fn find_instances(&self, filter: &InstanceFilter) -> Result<Vec<Instance>, StoreError> {
        self.inner.find_instances(filter).await
    }

    async fn count_instances(&self, filter: &InstanceFilter) -> Result<usize, StoreError> {
        self.inner.count_instances(filter).await
    }

    async fn insert_instance(&self, instance: Instance) -> Result<(), StoreError> {
        self.inner.insert_instance(instance).await
    }

    async fn update_instance_data(
        &self,
        id: InstanceId,
        data: InstanceData,
        expected_version: u64,
    ) -> Result<Instance, StoreError> {
        self.inner
            .update_instance_data(id, data, expected_version)
            .await
    }

    async fn merge_missing_keys(
        &self,
        id: InstanceId,
        seed: &InstanceData,
        level: Option<String>,
        expected_version: u64,
    ) -> Result<Instance, StoreError> {
        self.inner
            .merge_missing_keys(id, seed, level, expected_version)
            .await
    }

    async fn repoint_instances(
        &self,
        filter: &InstanceFilter,
        version: u32,
    ) -> Result<usize, StoreError> {
        if self
            .fire_if(|i| matches!(i, Interruption::FailRepoint))
            .is_some()
        {
            return Err(injected());
        }
        self.inner.repoint_instances(filter, version).await
    }

    async fn archive_instances(&self, filter: &InstanceFilter) -> Result<usize, StoreError> {
        self.inner.archive_instances(filter).await
    }

    async fn find_duplicates(&self) -> Result<Vec<DuplicateGroup>, StoreError> {
        self.inner.find_duplicates().await
    }
}

#[async_trait]
impl SettingsStore for ScriptedStore {
    async fn get_setting(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get_setting(key).await
    }
}

fn scripted_service(store: &Arc<ScriptedStore>) -> FolioService {
    FolioService::with_store(FolioConfig::default(), Arc::clone(store))
        .with_minter(Arc::new(SequentialMinter::new()))
}

async fn only_instance(service: &FolioService, template: &Template) -> Instance {
    service
        .instances(&InstanceFilter::new().template(template.id))
        .await
        .unwrap()
        .remove(0)
}

fn service(store: Arc<MemoryStore>) -> Arc<FolioService> {
    Arc::new(
        FolioService::with_store(FolioConfig::default(), store)
            .with_minter(Arc::new(SequentialMinter::new())),
    )
}

async fn template_with_instance(service: &FolioService) -> (Template, EnsureInstance) {
    let template = service
        .create_template(Template::new("Plan").with_pages(sample_pages()))
        .await
        .unwrap();
    let request =
        EnsureInstance::new(template.id, SubjectId::new("s1"), CycleId::new("2025"));
    service.ensure_instance(request.clone()).await.unwrap();
    (template, request)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_structural_saves_never_duplicate_versions() {
    let service = service(Arc::new(MemoryStore::new()));
    let (template, _) = template_with_instance(&service).await;

    let template_id = template.id;
    let saves = (0..8).map(|n| {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            let mut pages = sample_pages();
            pages[0].blocks.push(text_block(&format!("revision {n}")));
            service
                .save_structure(template_id, StructuralEdit::new(pages))
                .await
        })
    });
    let outcomes: Vec<_> = join_all(saves)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let minted: BTreeSet<u32> = outcomes.iter().filter_map(|o| o.minted).collect();
    assert_eq!(minted.len(), outcomes.len());
    assert_eq!(minted, (2..=9).collect::<BTreeSet<u32>>());

    let saved = service.template(template.id).await.unwrap();
    assert_eq!(saved.current_version, 9);
    assert_eq!(saved.revision, 8);
    let history: BTreeSet<u32> = saved.version_history.iter().map(|v| v.version).collect();
    assert_eq!(history, (1..=8).collect::<BTreeSet<u32>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writes_with_same_data_version_have_one_winner() {
    let service = service(Arc::new(MemoryStore::new()));
    let (template, _) = template_with_instance(&service).await;
    let instance = service
        .instances(&InstanceFilter::new().template(template.id))
        .await
        .unwrap()
        .remove(0);
    let instance_id = instance.id;

    let writes = (0..6).map(|n| {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            service
                .write_data(instance_id, data_from(&[("notes", json!(n))]), 0)
                .await
        })
    });
    let results: Vec<_> = join_all(writes)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(FolioError::is_conflict));
    assert_eq!(service.instance(instance.id).await.unwrap().data_version, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ensure_instance_retried_yields_one_live_instance() {
    let store = Arc::new(MemoryStore::new());
    let service = service(store.clone());
    let (template, request) = template_with_instance(&service).await;

    let retries = (0..2).map(|_| {
        let service = Arc::clone(&service);
        let request = request.clone();
        tokio::spawn(async move { service.ensure_instance(request).await })
    });
    let ids: BTreeSet<_> = join_all(retries)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().id)
        .collect();
    assert_eq!(ids.len(), 1);

    let live = store
        .count_instances(&InstanceFilter::new().template(template.id).live())
        .await
        .unwrap();
    assert_eq!(live, 1);
}

#[tokio::test]
async fn duplicate_report_lists_offending_pairs() {
    let store = Arc::new(MemoryStore::new());
    let template = sample_template();
    let first = live_instance(&template, "s1", "2025");
    let second = live_instance(&template, "s1", "2025");
    store.import_templates([template.clone()]);
    store.import_instances([
        first.clone(),
        second.clone(),
        live_instance(&template, "s2", "2025"),
    ]);

    let report = service(store).integrity_report().await.unwrap();
    assert!(!report.is_clean());
    assert_eq!(report.duplicates.len(), 1);
    let group = &report.duplicates[0];
    assert_eq!(group.template, template.id);
    assert_eq!(group.subject, SubjectId::new("s1"));
    let expected: BTreeSet<_> = [first.id, second.id].into();
    assert_eq!(group.instances.iter().copied().collect::<BTreeSet<_>>(), expected);
}

#[tokio::test]
async fn store_outage_is_surfaced_without_retry() {
    let store = Arc::new(MemoryStore::new());
    let service = service(store.clone());
    let (template, _) = template_with_instance(&service).await;

    store.set_available(false);
    let err = service.template(template.id).await.unwrap_err();
    assert!(matches!(err, FolioError::Store(StoreError::Unavailable(_))));
}

#[tokio::test]
async fn ensure_retry_keeps_a_write_committed_after_its_read() {
    let store = Arc::new(ScriptedStore::default());
    let service = scripted_service(&store);
    let (template, request) = template_with_instance(&service).await;
    let existing = only_instance(&service, &template).await;

    store.arm(Interruption::WriteAfterRead(data_from(&[(
        "notes",
        json!("committed"),
    )])));
    let ensured = service
        .ensure_instance(request.with_seed(data_from(&[("goals", json!("seed"))])))
        .await
        .unwrap();

    assert_eq!(ensured.id, existing.id);
    assert_eq!(ensured.data.get("notes"), Some(&json!("committed")));
    assert_eq!(ensured.data.get("goals"), Some(&json!("seed")));
    assert_eq!(ensured.data_version, 2);
    assert_eq!(service.instance(existing.id).await.unwrap(), ensured);
}

#[tokio::test]
async fn ensure_retry_never_revives_an_archived_instance() {
    let store = Arc::new(ScriptedStore::default());
    let service = scripted_service(&store);
    let (template, request) = template_with_instance(&service).await;
    let existing = only_instance(&service, &template).await;

    store.arm(Interruption::ArchiveAfterRead);
    let ensured = service
        .ensure_instance(request.with_seed(data_from(&[("goals", json!("seed"))])))
        .await
        .unwrap();

    let archived = service.instance(existing.id).await.unwrap();
    assert_eq!(archived.status, InstanceStatus::Archived);
    assert!(!archived.data.contains_key("goals"));

    assert_ne!(ensured.id, existing.id);
    assert!(ensured.is_live());
    assert_eq!(ensured.data.get("goals"), Some(&json!("seed")));
    let live = service
        .instances(&InstanceFilter::new().template(template.id).live())
        .await
        .unwrap();
    assert_eq!(live.len(), 1);
}

#[tokio::test]
async fn failed_repoint_leaves_the_template_unsaved_and_a_resend_advances() {
    let store = Arc::new(ScriptedStore::default());
    let service = scripted_service(&store);
    let (template, _) = template_with_instance(&service).await;
    let instance = only_instance(&service, &template).await;
    let mut pages = sample_pages();
    pages[0].blocks.push(text_block("new"));

    store.arm(Interruption::FailRepoint);
    let err = service
        .save_structure(template.id, StructuralEdit::new(pages.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, FolioError::Store(StoreError::Unavailable(_))));

    let stored = service.template(template.id).await.unwrap();
    assert_eq!(stored.current_version, 1);
    assert_eq!(stored.revision, 0);
    assert!(stored.version_history.is_empty());
    assert_eq!(service.instance(instance.id).await.unwrap().template_version, 1);

    let outcome = service
        .save_structure(template.id, StructuralEdit::new(pages))
        .await
        .unwrap();
    assert_eq!(outcome.change, ChangeKind::Structural);
    assert_eq!(outcome.minted, Some(2));
    assert!(outcome.advanced.contains(&instance.id));
    assert_eq!(service.instance(instance.id).await.unwrap().template_version, 2);
}

#[tokio::test]
async fn failed_template_commit_moves_instances_back() {
    let store = Arc::new(ScriptedStore::default());
    let service = scripted_service(&store);
    let (template, _) = template_with_instance(&service).await;
    let instance = only_instance(&service, &template).await;
    let mut pages = sample_pages();
    pages[0].blocks.push(text_block("new"));

    store.arm(Interruption::FailTemplateUpdate);
    let err = service
        .save_structure(template.id, StructuralEdit::new(pages))
        .await
        .unwrap_err();
    assert!(matches!(err, FolioError::Store(StoreError::Unavailable(_))));

    assert_eq!(service.template(template.id).await.unwrap().current_version, 1);
    assert_eq!(service.instance(instance.id).await.unwrap().template_version, 1);
}
