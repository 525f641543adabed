//! Pages and blocks
//!
//! A [`Block`] is a common envelope (`type`, stable `id`, optional `rowIds`)
//! around a [`BlockKind`] variant holding the kind-specific properties.
//! Grid blocks are the only container kind: their rows carry stable ids in
//! the envelope's `rowIds`, index-aligned with [`BlockKind::Grid::rows`].

use serde::{Deserialize, Serialize};

/// A page: ordered sequence of blocks
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Page {
    /// Create page from blocks
    #[inline]
    #[must_use]
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }
}

/// Positioned structural unit with a stable id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Stable id; empty when the authoring surface has not assigned one yet
    #[serde(default)]
    pub id: String,

    /// Stable row ids (grid blocks only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub row_ids: Vec<String>,

    /// Kind-specific properties
    #[serde(flatten)]
    pub kind: BlockKind,
}

impl Block {
    /// Create a block without an id
    #[inline]
    #[must_use]
    pub fn new(kind: BlockKind) -> Self {
        Self {
            id: String::new(),
            row_ids: Vec::new(),
            kind,
        }
    }

    /// Set stable id
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set row ids
    #[inline]
    #[must_use]
    pub fn with_row_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.row_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Type tag as persisted
    #[inline]
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        self.kind.type_tag()
    }

    /// Whether this block holds rows with their own ids
    #[inline]
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self.kind, BlockKind::Grid { .. })
    }

    /// Rows of a container block
    #[inline]
    #[must_use]
    pub fn rows(&self) -> Option<&[GridRow]> {
        match &self.kind {
            BlockKind::Grid { rows, .. } => Some(rows),
            _ => None,
        }
    }

    /// Mutable rows of a container block
    #[inline]
    pub fn rows_mut(&mut self) -> Option<&mut Vec<GridRow>> {
        match &mut self.kind {
            BlockKind::Grid { rows, .. } => Some(rows),
            _ => None,
        }
    }

    /// Position of a row id within this block
    #[must_use]
    pub fn row_position(&self, row_id: &str) -> Option<usize> {
        self.row_ids.iter().position(|id| id == row_id)
    }
}

/// Block properties per kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "properties", rename_all = "snake_case")]
pub enum BlockKind {
    /// Free text with variable placeholders
    Text { content: String },

    /// Section heading
    Heading { text: String, level: u8 },

    /// Static table
    Table { cells: Vec<Vec<String>> },

    /// Set of toggleable coded items
    Toggle {
        label: String,
        items: Vec<ToggleItem>,
    },

    /// Single choice from a list
    Dropdown {
        label: String,
        options: Vec<String>,
        #[serde(default)]
        selected: Option<String>,
    },

    /// Signature slot
    Signature { role: String },

    /// Promotion decision panel
    PromotionInfo { label: String },

    /// Visual separator
    Divider,

    /// Container: rows of cells, each row with its own toggle set
    Grid {
        columns: Vec<String>,
        rows: Vec<GridRow>,
    },
}

impl BlockKind {
    /// Type tag as persisted
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Heading { .. } => "heading",
            Self::Table { .. } => "table",
            Self::Toggle { .. } => "toggle",
            Self::Dropdown { .. } => "dropdown",
            Self::Signature { .. } => "signature",
            Self::PromotionInfo { .. } => "promotion_info",
            Self::Divider => "divider",
            Self::Grid { .. } => "grid",
        }
    }
}

/// A coded, leveled item that can be switched on for an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleItem {
    pub code: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(default)]
    pub active: bool,
}

impl ToggleItem {
    /// Inactive item with code and label
    #[must_use]
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
            level: None,
            active: false,
        }
    }

    /// Set level
    #[must_use]
    pub fn with_level(mut self, level: u8) -> Self {
        self.level = Some(level);
        self
    }

    /// Set active flag
    #[must_use]
    pub fn activated(mut self) -> Self {
        self.active = true;
        self
    }
}

/// A row of a grid block
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GridRow {
    #[serde(default)]
    pub cells: Vec<String>,
    #[serde(default)]
    pub toggles: Vec<ToggleItem>,
}

impl GridRow {
    /// Row with cells and no toggles
    #[must_use]
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
            toggles: Vec::new(),
        }
    }

    /// Set toggles
    #[must_use]
    pub fn with_toggles(mut self, toggles: Vec<ToggleItem>) -> Self {
        self.toggles = toggles;
        self
    }
}
