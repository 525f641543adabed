//! End-to-end flows through the service and the memory store

use std::collections::BTreeSet;
use std::sync::Arc;

use folio_core::{EnsureInstance, FolioConfig, FolioService, MemoryStore};
use folio_identity::SequentialMinter;
use folio_model::{BlockKind, CycleId, Instance, SubjectId, Template};
use folio_test_utils::{data_from, grid_block, sample_pages, text_block};
use folio_versioning::{PropagationTarget, StructuralEdit, VersionSource};
use pretty_assertions::assert_eq;
use serde_json::json;

async fn setup() -> (FolioService, Template, Instance) {
    let store = Arc::new(MemoryStore::new());
    let service = FolioService::with_store(FolioConfig::default(), store)
        .with_minter(Arc::new(SequentialMinter::new()));
    let template = service
        .create_template(Template::new("Support plan").with_pages(sample_pages()))
        .await
        .unwrap();
    let instance = service
        .ensure_instance(EnsureInstance::new(
            template.id,
            SubjectId::new("student-1"),
            CycleId::new("2025"),
        ))
        .await
        .unwrap();
    (service, template, instance)
}

#[tokio::test]
async fn row_toggles_follow_reordered_rows() {
    let (service, template, instance) = setup().await;
    service
        .write_data(
            instance.id,
            data_from(&[(
                "toggle_g1_row_r2",
                json!([{"code": "W", "label": "Scribe", "active": true}]),
            )]),
            0,
        )
        .await
        .unwrap();

    // editor reorders rows and drops the row ids
    let mut pages = sample_pages();
    pages[1].blocks[0] = grid_block(&["Goal"], &["Writing", "Reading"]).with_id("g1");
    let outcome = service
        .save_structure(template.id, StructuralEdit::new(pages))
        .await
        .unwrap();
    assert_eq!(outcome.minted, Some(2));
    assert!(outcome.advanced.contains(&instance.id));

    let saved = service.template(template.id).await.unwrap();
    assert_eq!(saved.pages[1].blocks[0].row_ids, vec!["r2", "r1"]);

    let view = service.render(instance.id).await.unwrap();
    assert_eq!(view.version, 2);
    let rows = view.pages[1].blocks[0].rows().unwrap();
    assert_eq!(rows[0].cells, vec!["Writing"]);
    assert_eq!(rows[0].toggles.len(), 1);
    assert!(rows[0].toggles[0].active);
    assert!(rows[1].toggles.is_empty());
    assert_eq!(view.applied, vec!["toggle_g1_row_r2"]);
}

#[tokio::test]
async fn pinned_instance_keeps_its_version_after_a_save() {
    let (service, template, instance) = setup().await;
    service
        .write_data(
            instance.id,
            data_from(&[("toggle_t1", json!([{"code": "A", "active": true}]))]),
            0,
        )
        .await
        .unwrap();

    let mut pages = sample_pages();
    pages[0].blocks.insert(0, text_block("Introduction"));
    let outcome = service
        .save_structure(
            template.id,
            StructuralEdit::new(pages).propagate_to(PropagationTarget::None),
        )
        .await
        .unwrap();
    assert_eq!(outcome.current_version, 2);

    let view = service.render(instance.id).await.unwrap();
    assert_eq!(view.version, 1);
    assert_eq!(view.source, VersionSource::History);
    assert_eq!(view.pages[0].blocks.len(), 2);
    match &view.pages[0].blocks[1].kind {
        BlockKind::Toggle { items, .. } => {
            assert_eq!(items.len(), 1);
            assert!(items[0].active);
        }
        other => panic!("expected toggle, got {other:?}"),
    }

    let advanced = service
        .propagate(template.id, 2, BTreeSet::from([instance.id]))
        .await
        .unwrap();
    assert_eq!(advanced.repointed, 1);
    let view = service.render(instance.id).await.unwrap();
    assert_eq!(view.version, 2);
    assert_eq!(view.source, VersionSource::Live);
    assert_eq!(view.pages[0].blocks.len(), 3);
}

#[tokio::test]
async fn rollback_never_leads_to_version_reuse() {
    let (service, template, instance) = setup().await;

    let mut pages = sample_pages();
    pages[0].blocks.push(text_block("v2"));
    let first = service
        .save_structure(template.id, StructuralEdit::new(pages.clone()))
        .await
        .unwrap();
    assert_eq!(first.minted, Some(2));

    service
        .rollback(template.id, 1, BTreeSet::from([instance.id]))
        .await
        .unwrap();
    assert_eq!(service.instance(instance.id).await.unwrap().template_version, 1);

    pages[0].blocks.push(text_block("v3"));
    let second = service
        .save_structure(template.id, StructuralEdit::new(pages))
        .await
        .unwrap();
    assert_eq!(second.previous_version, 2);
    assert_eq!(second.minted, Some(3));

    let saved = service.template(template.id).await.unwrap();
    let history: Vec<u32> = saved.version_history.iter().map(|v| v.version).collect();
    assert_eq!(history, vec![1, 2]);
    assert_eq!(saved.current_version, 3);
}

#[tokio::test]
async fn legacy_positional_keys_still_render() {
    let (service, _, instance) = setup().await;
    service
        .write_data(
            instance.id,
            data_from(&[("toggle_0_1", json!([{"code": "B", "active": true}]))]),
            0,
        )
        .await
        .unwrap();
    let view = service.render(instance.id).await.unwrap();
    assert_eq!(view.applied, vec!["toggle_0_1"]);
    assert!(view.dropped.is_empty());
}
