//! Structural validation of save payloads
//!
//! Runs before any mutation so that a malformed payload never leaves
//! partial state behind.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockKind, Page, ToggleItem};
use crate::error::ModelError;

/// Size bounds for a structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralLimits {
    pub max_pages: usize,
    pub max_blocks_per_page: usize,
    pub max_rows_per_block: usize,
}

impl Default for StructuralLimits {
    fn default() -> Self {
        Self {
            max_pages: 200,
            max_blocks_per_page: 500,
            max_rows_per_block: 1_000,
        }
    }
}

/// Validate pages against limits and per-kind invariants
///
/// # Errors
/// Returns [`ModelError::StructuralInput`] naming the first offending element
pub fn validate_pages(pages: &[Page], limits: &StructuralLimits) -> Result<(), ModelError> {
    if pages.len() > limits.max_pages {
        return Err(ModelError::structural(
            "template",
            format!("{} pages exceed limit {}", pages.len(), limits.max_pages),
        ));
    }
    for (p, page) in pages.iter().enumerate() {
        if page.blocks.len() > limits.max_blocks_per_page {
            return Err(ModelError::structural(
                format!("page {p}"),
                format!(
                    "{} blocks exceed limit {}",
                    page.blocks.len(),
                    limits.max_blocks_per_page
                ),
            ));
        }
        for (b, block) in page.blocks.iter().enumerate() {
            validate_block(block, limits)
                .map_err(|reason| ModelError::structural(format!("page {p} / block {b}"), reason))?;
        }
    }
    Ok(())
}

fn validate_block(block: &Block, limits: &StructuralLimits) -> Result<(), String> {
    if !block.is_container() && !block.row_ids.is_empty() {
        return Err(format!("{} block cannot carry row ids", block.type_tag()));
    }
    match &block.kind {
        BlockKind::Heading { level, .. } if !(1..=6).contains(level) => {
            Err(format!("heading level {level} out of range 1..=6"))
        }
        BlockKind::Toggle { items, .. } => validate_toggle_codes(items),
        BlockKind::Dropdown {
            options, selected, ..
        } => match selected {
            Some(sel) if !options.contains(sel) => {
                Err(format!("selected option '{sel}' is not among the options"))
            }
            _ => Ok(()),
        },
        BlockKind::Grid { columns, rows } => {
            if rows.len() > limits.max_rows_per_block {
                return Err(format!(
                    "{} rows exceed limit {}",
                    rows.len(),
                    limits.max_rows_per_block
                ));
            }
            for (r, row) in rows.iter().enumerate() {
                if row.cells.len() > columns.len() {
                    return Err(format!(
                        "row {r} has {} cells for {} columns",
                        row.cells.len(),
                        columns.len()
                    ));
                }
                validate_toggle_codes(&row.toggles).map_err(|e| format!("row {r}: {e}"))?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn validate_toggle_codes(items: &[ToggleItem]) -> Result<(), String> {
    let mut seen = HashSet::new();
    for item in items {
        if item.code.trim().is_empty() {
            return Err("toggle item with empty code".to_string());
        }
        if !seen.insert(item.code.as_str()) {
            return Err(format!("duplicate toggle code '{}'", item.code));
        }
    }
    Ok(())
}
