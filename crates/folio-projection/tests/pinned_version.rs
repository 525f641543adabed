//! Instances pinned to an archived version keep rendering that version

use folio_model::BlockKind;
use folio_projection::{Projector, ResolverChain, StableIdResolver};
use folio_test_utils::{data_from, live_instance, sample_pages, sample_template, text_block};
use folio_versioning::{PropagationController, PropagationTarget, StructuralEdit, VersionSource};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn pinned_instance_renders_archived_structure() {
    let mut template = sample_template();
    let mut instance = live_instance(&template, "student-1", "2025");
    instance.data = data_from(&[(
        "toggle_t1",
        json!([{"code": "A", "label": "Item A", "active": true}]),
    )]);
    assert_eq!(instance.template_version, 1);

    let mut next = sample_pages();
    next[0].blocks.push(text_block("New section").with_id("n1"));
    let edit = StructuralEdit::new(next).propagate_to(PropagationTarget::None);

    let controller = PropagationController::new();
    let plan = controller.plan(&template, &edit, 1).unwrap();
    let outcome = controller
        .apply(&mut template, edit, &plan, [instance.id])
        .unwrap();
    assert_eq!(template.current_version, 2);
    assert!(outcome.advanced.is_empty());
    assert_eq!(template.history_entry(1).unwrap().pages, sample_pages());

    let view = Projector::new().project(&template, instance.template_version, &instance.data);
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

    let live = Projector::new().project(&template, 2, &instance.data);
    assert_eq!(live.pages[0].blocks.len(), 3);
}

#[test]
fn stable_only_chain_ignores_positional_keys() {
    let template = sample_template();
    let data = data_from(&[("toggle_0_1", json!([{"code": "Z"}]))]);

    let mut chain = ResolverChain::new();
    chain.register(StableIdResolver);
    let view = Projector::with_resolvers(chain).project(&template, 1, &data);
    assert_eq!(view.pages, template.pages);
    assert_eq!(view.dropped, vec!["toggle_0_1"]);
}
