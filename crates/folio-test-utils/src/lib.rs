//! Testing utilities for the folio workspace
//!
//! Shared fixtures: blocks, a sample template structure, and instance
//! builders.

#![allow(missing_docs)]

use folio_model::{
    Block, BlockKind, CycleId, GridRow, Instance, InstanceData, InstanceStatus, Page, SubjectId,
    Template, ToggleItem,
};
use serde_json::Value;

pub fn text_block(content: &str) -> Block {
    Block::new(BlockKind::Text {
        content: content.to_string(),
    })
}

pub fn heading_block(text: &str) -> Block {
    Block::new(BlockKind::Heading {
        text: text.to_string(),
        level: 2,
    })
}

pub fn toggle_block(label: &str, codes: &[&str]) -> Block {
    Block::new(BlockKind::Toggle {
        label: label.to_string(),
        items: codes
            .iter()
            .map(|code| ToggleItem::new(*code, format!("Item {code}")))
            .collect(),
    })
}

pub fn grid_block(columns: &[&str], rows: &[&str]) -> Block {
    Block::new(BlockKind::Grid {
        columns: columns.iter().map(|c| (*c).to_string()).collect(),
        rows: rows.iter().map(|r| GridRow::new([*r])).collect(),
    })
}

/// Support-plan structure with every id assigned
pub fn sample_pages() -> Vec<Page> {
    vec![
        Page::new(vec![
            heading_block("Support plan").with_id("h1"),
            toggle_block("Accommodations", &["A", "B", "C"]).with_id("t1"),
        ]),
        Page::new(vec![
            grid_block(&["Goal"], &["Reading", "Writing"])
                .with_id("g1")
                .with_row_ids(["r1", "r2"]),
            Block::new(BlockKind::Signature {
                role: "Teacher".to_string(),
            })
            .with_id("s1"),
        ]),
    ]
}

/// Same structure as [`sample_pages`] with ids stripped
pub fn sample_pages_without_ids() -> Vec<Page> {
    let mut pages = sample_pages();
    for block in pages.iter_mut().flat_map(|p| p.blocks.iter_mut()) {
        block.id.clear();
        block.row_ids.clear();
    }
    pages
}

pub fn sample_template() -> Template {
    Template::new("Support plan").with_pages(sample_pages())
}

pub fn data_from(entries: &[(&str, Value)]) -> InstanceData {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

pub fn live_instance(template: &Template, subject: &str, cycle: &str) -> Instance {
    Instance::new(template, SubjectId::new(subject), CycleId::new(cycle))
}

/// Archived instance of a past cycle carrying `data`
pub fn archived_instance(
    template: &Template,
    subject: &str,
    cycle: &str,
    data: InstanceData,
) -> Instance {
    let mut instance = live_instance(template, subject, cycle).with_data(data);
    instance.status = InstanceStatus::Archived;
    instance
}
