//! Propagation controller
//!
//! Decides, for a structural save, whether a new version is minted and
//! which instances advance to it. Also validates explicit repoint requests
//! (`propagate`, `rollback`).
//!
//! # Rules
//! - A save is [`ChangeKind::Structural`] when pages or metadata differ
//!   from the live structure by canonical fingerprint; title-only edits are
//!   cosmetic
//! - A version is minted iff at least one instance references the template
//!   and the change is structural
//! - Minting archives the pre-change structure under the number it was live
//!   as and advances `current_version` past every known version

use std::collections::BTreeSet;

use chrono::Utc;
use folio_model::{structure_fingerprint, InstanceId, Page, Template, TemplateMetadata};
use serde::{Deserialize, Serialize};

use crate::error::VersionError;
use crate::store::VersionStore;

/// Which instances advance after a minted version
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "TargetRepr", into = "TargetRepr")]
pub enum PropagationTarget {
    /// Every live instance of the template
    #[default]
    All,
    /// No instance; all keep their pinned version
    None,
    /// Exactly these instances
    Instances(BTreeSet<InstanceId>),
}

impl PropagationTarget {
    /// Target an explicit instance set
    #[must_use]
    pub fn instances(ids: impl IntoIterator<Item = InstanceId>) -> Self {
        Self::Instances(ids.into_iter().collect())
    }

    /// Whether this target selects the instance
    #[must_use]
    pub fn selects(&self, id: &InstanceId) -> bool {
        match self {
            Self::All => true,
            Self::None => false,
            Self::Instances(ids) => ids.contains(id),
        }
    }
}

/// Wire shape: `"all"`, `"none"` or a list of instance ids
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TargetRepr {
    Sentinel(Sentinel),
    Instances(BTreeSet<InstanceId>),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Sentinel {
    All,
    None,
}

impl From<TargetRepr> for PropagationTarget {
    fn from(repr: TargetRepr) -> Self {
        match repr {
            TargetRepr::Sentinel(Sentinel::All) => Self::All,
            TargetRepr::Sentinel(Sentinel::None) => Self::None,
            TargetRepr::Instances(ids) => Self::Instances(ids),
        }
    }
}

impl From<PropagationTarget> for TargetRepr {
    fn from(target: PropagationTarget) -> Self {
        match target {
            PropagationTarget::All => Self::Sentinel(Sentinel::All),
            PropagationTarget::None => Self::Sentinel(Sentinel::None),
            PropagationTarget::Instances(ids) => Self::Instances(ids),
        }
    }
}

/// Significance of an edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Pages or metadata changed
    Structural,
    /// Nothing versioned changed (title only, or identical payload)
    Cosmetic,
}

/// Structural save request
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralEdit {
    pub pages: Vec<Page>,
    #[serde(default)]
    pub metadata: TemplateMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    /// Omitted means [`PropagationTarget::All`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub propagate: Option<PropagationTarget>,
}

impl StructuralEdit {
    /// Edit replacing the pages
    #[must_use]
    pub fn new(pages: Vec<Page>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    /// Set metadata
    #[must_use]
    pub fn with_metadata(mut self, metadata: TemplateMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set author and description recorded on a minted snapshot
    #[must_use]
    pub fn by(mut self, author: impl Into<String>, description: impl Into<String>) -> Self {
        self.author = author.into();
        self.description = description.into();
        self
    }

    /// Set propagation target
    #[must_use]
    pub fn propagate_to(mut self, target: PropagationTarget) -> Self {
        self.propagate = Some(target);
        self
    }

    /// Effective propagation target
    #[must_use]
    pub fn target(&self) -> PropagationTarget {
        self.propagate.clone().unwrap_or_default()
    }
}

/// Decision for one save, computed before mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePlan {
    pub change: ChangeKind,
    /// Version to be minted, if any
    pub mint: Option<u32>,
    /// Instances to advance when a version is minted
    pub target: PropagationTarget,
    /// Template revision the plan was computed against
    pub base_revision: u64,
}

impl SavePlan {
    /// Whether a version is minted
    #[inline]
    #[must_use]
    pub fn mints(&self) -> bool {
        self.mint.is_some()
    }
}

/// Result of applying a save plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub change: ChangeKind,
    /// Live version before the save
    pub previous_version: u32,
    /// Live version after the save
    pub current_version: u32,
    /// Newly minted version, if any
    pub minted: Option<u32>,
    /// Instances advanced to `current_version`
    #[serde(default)]
    pub advanced: BTreeSet<InstanceId>,
}

/// Validated request to repoint instances to an explicit version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepointPlan {
    pub version: u32,
    pub instances: BTreeSet<InstanceId>,
}

/// Save and repoint decisions
#[derive(Debug, Clone, Copy, Default)]
pub struct PropagationController;

impl PropagationController {
    /// Create controller
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Classify an edit against the live structure
    ///
    /// # Errors
    /// Returns error if either structure cannot be fingerprinted
    pub fn classify(template: &Template, edit: &StructuralEdit) -> Result<ChangeKind, VersionError> {
        let live = template.structure_fingerprint()?;
        let next = structure_fingerprint(&edit.pages, &edit.metadata)?;
        Ok(if live == next {
            ChangeKind::Cosmetic
        } else {
            ChangeKind::Structural
        })
    }

    /// Plan a save given how many instances reference the template
    ///
    /// # Errors
    /// Returns error if classification fails
    pub fn plan(
        &self,
        template: &Template,
        edit: &StructuralEdit,
        referencing_instances: usize,
    ) -> Result<SavePlan, VersionError> {
        let change = Self::classify(template, edit)?;
        let mint = (change == ChangeKind::Structural && referencing_instances > 0)
            .then(|| template.next_version_number());
        Ok(SavePlan {
            change,
            mint,
            target: edit.target(),
            base_revision: template.revision,
        })
    }

    /// Apply a planned save to the template document
    ///
    /// Instance repointing is left to the caller; `advanced` lists which of
    /// `candidates` the plan selects.
    ///
    /// # Errors
    /// Returns error if archiving collides with an existing snapshot
    pub fn apply(
        &self,
        template: &mut Template,
        edit: StructuralEdit,
        plan: &SavePlan,
        candidates: impl IntoIterator<Item = InstanceId>,
    ) -> Result<SaveOutcome, VersionError> {
        let previous_version = template.current_version;
        let minted = if plan.mints() {
            let version = template.archive_current(&edit.author, &edit.description)?;
            tracing::info!(
                template = %template.id,
                archived = previous_version,
                minted = version,
                "minted template version"
            );
            Some(version)
        } else {
            None
        };

        template.pages = edit.pages;
        template.metadata = edit.metadata;
        if let Some(title) = edit.title {
            template.title = title;
        }
        template.revision += 1;
        template.updated_at = Utc::now();

        let advanced = if minted.is_some() {
            candidates
                .into_iter()
                .filter(|id| plan.target.selects(id))
                .collect()
        } else {
            BTreeSet::new()
        };

        Ok(SaveOutcome {
            change: plan.change,
            previous_version,
            current_version: template.current_version,
            minted,
            advanced,
        })
    }

    /// Reject unknown target versions
    ///
    /// # Errors
    /// Returns [`VersionError::VersionNotFound`] if `version` is neither
    /// current nor archived
    pub fn ensure_version_exists(template: &Template, version: u32) -> Result<(), VersionError> {
        if template.has_version(version) {
            Ok(())
        } else {
            Err(VersionError::VersionNotFound {
                template: template.id,
                version,
                known: template.known_versions().into_iter().collect(),
            })
        }
    }

    /// Validate a `propagate` or `rollback` request
    ///
    /// # Errors
    /// Returns [`VersionError::VersionNotFound`] for unknown versions
    pub fn repoint(
        &self,
        template: &Template,
        version: u32,
        instances: impl IntoIterator<Item = InstanceId>,
    ) -> Result<RepointPlan, VersionError> {
        Self::ensure_version_exists(template, version)?;
        Ok(RepointPlan {
            version,
            instances: instances.into_iter().collect(),
        })
    }
}
