//! Data merge projector
//!
//! Resolves an instance's pinned version, deep-copies its structure and
//! overlays structural data values onto the copy. The shared template is
//! never touched.
//!
//! Only the `toggle` feature mutates structure: on a toggle block it replaces
//! the item list, on a grid row it replaces the row's toggle set. Every
//! other key is left for downstream variable substitution. Dangling keys and
//! undecodable values are dropped, never raised.

use folio_model::{decode_toggle_items, BlockKind, DataKey, InstanceData, Page, Template,
    TemplateId, ToggleItem};
use folio_versioning::{VersionSource, VersionStore};
use serde::{Deserialize, Serialize};

use crate::resolver::{Addressing, ResolverChain, StructureIndex, Target};

/// Read-only structure with instance overlays applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializedView {
    pub template_id: TemplateId,
    /// Version whose structure was rendered
    pub version: u32,
    pub source: VersionSource,
    pub pages: Vec<Page>,
    /// Keys overlaid onto the structure, in application order
    pub applied: Vec<String>,
    /// Structural keys that resolved to nothing or failed to decode
    pub dropped: Vec<String>,
}

impl MaterializedView {
    /// Whether the pinned version was missing and live was rendered
    #[inline]
    #[must_use]
    pub fn fell_back(&self) -> bool {
        self.source.fell_back()
    }
}

struct Overlay<'d> {
    key: &'d str,
    addressing: Addressing,
    target: Target,
    items: Vec<ToggleItem>,
}

/// Pure projector over a resolver chain
#[derive(Debug, Default)]
pub struct Projector {
    resolvers: ResolverChain,
}

impl Projector {
    /// Projector with stable-id and positional resolvers
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Projector with a custom resolver chain
    #[inline]
    #[must_use]
    pub fn with_resolvers(resolvers: ResolverChain) -> Self {
        Self { resolvers }
    }

    /// Render `data` onto the template resolved at `pinned`
    #[must_use]
    pub fn project(&self, template: &Template, pinned: u32, data: &InstanceData) -> MaterializedView {
        let resolved = template.resolve_version(pinned);
        let mut pages = resolved.pages.to_vec();
        let index = StructureIndex::build(&pages);

        let mut dropped = Vec::new();
        let mut overlays = Vec::new();
        for (raw, value) in data.iter() {
            let Some(key) = DataKey::parse(raw) else {
                continue;
            };
            if !key.is_structural() || value.is_null() {
                continue;
            }
            let Some((addressing, target)) = self.resolvers.resolve(&key, &pages, &index) else {
                tracing::debug!(key = raw, "dropping dangling data key");
                dropped.push(raw.to_string());
                continue;
            };
            match decode_toggle_items(value) {
                Ok(items) => overlays.push(Overlay {
                    key: raw,
                    addressing,
                    target,
                    items,
                }),
                Err(e) => {
                    tracing::debug!(key = raw, error = %e, "dropping undecodable data value");
                    dropped.push(raw.to_string());
                }
            }
        }

        // Stable sort keeps key order within one addressing scheme.
        overlays.sort_by_key(|o| o.addressing);

        let mut applied = Vec::with_capacity(overlays.len());
        for overlay in overlays {
            if apply(&mut pages, overlay.target, overlay.items) {
                applied.push(overlay.key.to_string());
            } else {
                tracing::debug!(key = overlay.key, "data key does not fit its element");
                dropped.push(overlay.key.to_string());
            }
        }

        MaterializedView {
            template_id: template.id,
            version: resolved.version,
            source: resolved.source,
            pages,
            applied,
            dropped,
        }
    }
}

/// Overlay items at a target; false when the element cannot take them
fn apply(pages: &mut [Page], target: Target, items: Vec<ToggleItem>) -> bool {
    match target {
        Target::Block { page, block } => match &mut pages[page].blocks[block].kind {
            BlockKind::Toggle { items: current, .. } => {
                *current = items;
                true
            }
            _ => false,
        },
        Target::Row { page, block, row } => {
            match pages[page].blocks[block]
                .rows_mut()
                .and_then(|rows| rows.get_mut(row))
            {
                Some(grid_row) => {
                    grid_row.toggles = items;
                    true
                }
                None => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_model::{Block, GridRow};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn template() -> Template {
        Template::new("Plan").with_pages(vec![Page::new(vec![
            Block::new(BlockKind::Toggle {
                label: "Supports".into(),
                items: vec![ToggleItem::new("A", "Extra time"), ToggleItem::new("B", "Breaks")],
            })
            .with_id("t1"),
            Block::new(BlockKind::Grid {
                columns: vec!["Goal".into()],
                rows: vec![GridRow::new(["Read"]), GridRow::new(["Write"])],
            })
            .with_id("g1")
            .with_row_ids(["r1", "r2"]),
            Block::new(BlockKind::Text {
                content: "{{studentname}}".into(),
            })
            .with_id("x1"),
        ])])
    }

    fn data(entries: &[(&str, Value)]) -> InstanceData {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn toggle_items(view: &MaterializedView) -> &[ToggleItem] {
        match &view.pages[0].blocks[0].kind {
            BlockKind::Toggle { items, .. } => items,
            other => panic!("unexpected block {other:?}"),
        }
    }

    #[test]
    fn toggle_overlay_replaces_items() {
        let t = template();
        let d = data(&[(
            "toggle_t1",
            json!([{"code": "A", "label": "Extra time", "active": true}]),
        )]);
        let view = Projector::new().project(&t, 1, &d);
        assert_eq!(toggle_items(&view).len(), 1);
        assert!(toggle_items(&view)[0].active);
        assert_eq!(view.applied, vec!["toggle_t1"]);
        // Shared template untouched
        match &t.pages[0].blocks[0].kind {
            BlockKind::Toggle { items, .. } => assert_eq!(items.len(), 2),
            _ => unreachable!(),
        }
    }

    #[test]
    fn stable_id_wins_over_positional() {
        let t = template();
        let d = data(&[
            ("toggle_0_0", json!([{"code": "P", "label": "positional"}])),
            ("toggle_t1", json!([{"code": "S", "label": "stable"}])),
        ]);
        let view = Projector::new().project(&t, 1, &d);
        assert_eq!(toggle_items(&view)[0].code, "S");
        assert_eq!(view.applied, vec!["toggle_0_0", "toggle_t1"]);
    }

    #[test]
    fn row_overlay_by_stable_id_and_position() {
        let t = template();
        let d = data(&[
            ("toggle_g1_row_r2", json!([{"code": "W", "label": "weekly", "active": true}])),
            ("toggle_0_1_row_0", json!([{"code": "D", "label": "daily"}])),
        ]);
        let view = Projector::new().project(&t, 1, &d);
        let rows = view.pages[0].blocks[1].rows().unwrap();
        assert_eq!(rows[0].toggles[0].code, "D");
        assert_eq!(rows[1].toggles[0].code, "W");
    }

    #[test]
    fn dangling_and_bad_keys_are_dropped_quietly() {
        let t = template();
        let d = data(&[
            ("toggle_gone", json!([])),
            ("toggle_g1_row_r9", json!([])),
            ("toggle_x1", json!([])),
            ("toggle_t1", json!("not a list")),
            ("studentname", json!("Ada")),
            ("text_x1", json!("free text")),
        ]);
        let view = Projector::new().project(&t, 1, &d);
        assert_eq!(view.pages, t.pages);
        assert!(view.applied.is_empty());
        assert_eq!(
            view.dropped,
            vec!["toggle_g1_row_r9", "toggle_gone", "toggle_t1", "toggle_x1"]
        );
    }

    #[test]
    fn unknown_version_renders_live() {
        let t = template();
        let view = Projector::new().project(&t, 42, &InstanceData::new());
        assert!(view.fell_back());
        assert_eq!(view.version, 1);
        assert_eq!(view.pages, t.pages);
    }
}
