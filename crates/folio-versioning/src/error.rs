//! Error types for versioning

use folio_model::{ModelError, TemplateId};

/// Errors raised by version resolution and propagation
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    /// Propagation or rollback target is neither current nor archived
    #[error("template {template} has no version {version} (known: {known:?})")]
    VersionNotFound {
        template: TemplateId,
        version: u32,
        known: Vec<u32>,
    },

    /// Live version number already present in history
    #[error("version {version} of template {template} is already archived")]
    SnapshotCollision { template: TemplateId, version: u32 },

    /// Model error (invalid structure, encoding failure)
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl VersionError {
    /// Whether the error is a missing target version
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::VersionNotFound { .. })
    }
}
