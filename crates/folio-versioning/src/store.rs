//! Version store over a template document
//!
//! A template holds its live structure under `current_version` plus an
//! append-only list of immutable snapshots. [`VersionStore`] is the read and
//! archive interface over that shape.

use std::collections::BTreeSet;

use chrono::Utc;
use folio_model::{Page, Template, TemplateMetadata, VersionSnapshot};
use serde::{Deserialize, Serialize};

use crate::error::VersionError;

/// Where a resolved structure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VersionSource {
    /// Pinned version equals `current_version`
    Live,
    /// Pinned version found in history
    History,
    /// Pinned version unknown; live structure used instead
    Fallback {
        /// Version the caller asked for
        requested: u32,
    },
}

impl VersionSource {
    /// Whether resolution fell back to the live structure
    #[inline]
    #[must_use]
    pub fn fell_back(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Borrowed structure for one version
#[derive(Debug, Clone, Copy)]
pub struct ResolvedVersion<'t> {
    /// Version actually rendered
    pub version: u32,
    pub pages: &'t [Page],
    pub metadata: &'t TemplateMetadata,
    pub source: VersionSource,
}

/// Version lookup and archiving
pub trait VersionStore {
    /// Resolve a pinned version; never fails
    fn resolve_version(&self, pinned: u32) -> ResolvedVersion<'_>;

    /// Whether `version` is current or archived
    fn has_version(&self, version: u32) -> bool;

    /// Current version plus every archived version
    fn known_versions(&self) -> BTreeSet<u32>;

    /// Number the next minted version will receive
    fn next_version_number(&self) -> u32;

    /// Snapshot the live structure under its current number and advance
    /// `current_version`; returns the new current version
    ///
    /// # Errors
    /// Returns [`VersionError::SnapshotCollision`] if the live version is
    /// already archived
    fn archive_current(&mut self, author: &str, description: &str) -> Result<u32, VersionError>;
}

impl VersionStore for Template {
    fn resolve_version(&self, pinned: u32) -> ResolvedVersion<'_> {
        if pinned == self.current_version {
            return ResolvedVersion {
                version: self.current_version,
                pages: &self.pages,
                metadata: &self.metadata,
                source: VersionSource::Live,
            };
        }
        if let Some(snapshot) = self.history_entry(pinned) {
            return ResolvedVersion {
                version: snapshot.version,
                pages: &snapshot.pages,
                metadata: &snapshot.metadata,
                source: VersionSource::History,
            };
        }
        tracing::warn!(
            template = %self.id,
            requested = pinned,
            current = self.current_version,
            "pinned version missing, rendering live structure"
        );
        ResolvedVersion {
            version: self.current_version,
            pages: &self.pages,
            metadata: &self.metadata,
            source: VersionSource::Fallback { requested: pinned },
        }
    }

    fn has_version(&self, version: u32) -> bool {
        version == self.current_version || self.history_entry(version).is_some()
    }

    fn known_versions(&self) -> BTreeSet<u32> {
        self.version_history
            .iter()
            .map(|s| s.version)
            .chain(std::iter::once(self.current_version))
            .collect()
    }

    fn next_version_number(&self) -> u32 {
        let highest = self
            .version_history
            .iter()
            .map(|s| s.version)
            .max()
            .unwrap_or(0)
            .max(self.current_version);
        highest.saturating_add(1)
    }

    fn archive_current(&mut self, author: &str, description: &str) -> Result<u32, VersionError> {
        if self.history_entry(self.current_version).is_some() {
            return Err(VersionError::SnapshotCollision {
                template: self.id,
                version: self.current_version,
            });
        }
        let next = self.next_version_number();
        self.version_history.push(VersionSnapshot {
            version: self.current_version,
            pages: self.pages.clone(),
            metadata: self.metadata.clone(),
            created_at: Utc::now(),
            created_by: author.to_string(),
            description: description.to_string(),
        });
        self.current_version = next;
        Ok(next)
    }
}
