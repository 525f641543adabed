//! Templates and immutable version snapshots

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::block::{Block, Page};
use crate::error::ModelError;
use crate::hash::Fingerprint;
use crate::ids::TemplateId;

/// Template-wide auxiliary metadata (ordered for canonical hashing)
pub type TemplateMetadata = BTreeMap<String, serde_json::Value>;

/// Versioned document schema
///
/// # Invariants
/// - `current_version` starts at 1 and only grows
/// - `version_history` is append-only and holds distinct version numbers,
///   none equal to `current_version`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: TemplateId,
    /// Display title (cosmetic: changing it never mints a version)
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub metadata: TemplateMetadata,
    pub current_version: u32,
    #[serde(default)]
    pub version_history: Vec<VersionSnapshot>,
    /// Save counter for conditional updates
    #[serde(default)]
    pub revision: u64,
    /// Levels for which this template is a default seeding choice
    #[serde(default)]
    pub default_for_levels: BTreeSet<String>,
    #[serde(default)]
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    /// Create an empty template at version 1
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TemplateId::new(),
            title: title.into(),
            pages: Vec::new(),
            metadata: TemplateMetadata::new(),
            current_version: 1,
            version_history: Vec::new(),
            revision: 0,
            default_for_levels: BTreeSet::new(),
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace live pages
    #[must_use]
    pub fn with_pages(mut self, pages: Vec<Page>) -> Self {
        self.pages = pages;
        self
    }

    /// Mark as a default choice for a level
    #[must_use]
    pub fn default_for(mut self, level: impl Into<String>) -> Self {
        self.default_for_levels.insert(level.into());
        self
    }

    /// Iterate live blocks in document order
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.pages.iter().flat_map(|p| p.blocks.iter())
    }

    /// History entry by version number
    #[must_use]
    pub fn history_entry(&self, version: u32) -> Option<&VersionSnapshot> {
        self.version_history.iter().find(|s| s.version == version)
    }

    /// Fingerprint of the live structure (pages + metadata)
    ///
    /// # Errors
    /// Returns error if the structure cannot be encoded
    pub fn structure_fingerprint(&self) -> Result<Fingerprint, ModelError> {
        structure_fingerprint(&self.pages, &self.metadata)
    }
}

/// Fingerprint of a structure as compared for change significance
///
/// # Errors
/// Returns error if the structure cannot be encoded
pub fn structure_fingerprint(
    pages: &[Page],
    metadata: &TemplateMetadata,
) -> Result<Fingerprint, ModelError> {
    Fingerprint::of_json(&(pages, metadata))
}

/// Immutable snapshot of a template's structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSnapshot {
    pub version: u32,
    pub pages: Vec<Page>,
    #[serde(default)]
    pub metadata: TemplateMetadata,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(default)]
    pub description: String,
}
