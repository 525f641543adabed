//! Coarse content signatures
//!
//! A signature is a Blake3 digest over the kind tag plus a few salient,
//! size-capped fields. It is deliberately lossy: two elements with equal
//! signatures are treated as candidates for the same identity.

use folio_model::{Block, BlockKind, Fingerprint, GridRow, ToggleItem};
use serde::{Deserialize, Serialize};

/// Signature tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureOptions {
    /// Maximum characters taken from any text field
    pub text_cap: usize,
}

impl Default for SignatureOptions {
    fn default() -> Self {
        Self { text_cap: 64 }
    }
}

/// Content signature of a block or row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(Fingerprint);

impl Signature {
    /// Signature of a block
    #[must_use]
    pub fn of_block(block: &Block, options: &SignatureOptions) -> Self {
        let cap = options.text_cap;
        let mut fields = vec![block.type_tag().to_string()];
        match &block.kind {
            BlockKind::Text { content } => fields.push(capped(content, cap)),
            BlockKind::Heading { text, level } => {
                fields.push(level.to_string());
                fields.push(capped(text, cap));
            }
            BlockKind::Table { cells } => {
                let first_row = cells.first().map(|row| row.join("|")).unwrap_or_default();
                let first_col = cells
                    .iter()
                    .filter_map(|row| row.first().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join("|");
                fields.push(capped(&first_row, cap));
                fields.push(capped(&first_col, cap));
            }
            BlockKind::Toggle { items, .. } => fields.push(capped(&item_codes(items), cap)),
            BlockKind::Dropdown { label, options, .. } => {
                fields.push(capped(label, cap));
                fields.push(capped(&options.join("|"), cap));
            }
            BlockKind::Signature { role } => fields.push(capped(role, cap)),
            BlockKind::PromotionInfo { label } => fields.push(capped(label, cap)),
            BlockKind::Divider => {}
            BlockKind::Grid { columns, .. } => fields.push(capped(&columns.join("|"), cap)),
        }
        Self(Fingerprint::of_fields(&fields))
    }

    /// Signature of a grid row
    #[must_use]
    pub fn of_row(row: &GridRow, options: &SignatureOptions) -> Self {
        let cap = options.text_cap;
        let fields = [
            "row".to_string(),
            capped(&row.cells.join("|"), cap),
            capped(&item_codes(&row.toggles), cap),
        ];
        Self(Fingerprint::of_fields(&fields))
    }

    /// Underlying digest
    #[inline]
    #[must_use]
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.0
    }
}

fn capped(text: &str, cap: usize) -> String {
    text.trim().chars().take(cap).collect()
}

fn item_codes(items: &[ToggleItem]) -> String {
    items
        .iter()
        .map(|item| match item.level {
            Some(level) => format!("{}:{level}", item.code),
            None => item.code.clone(),
        })
        .collect::<Vec<_>>()
        .join(",")
}
