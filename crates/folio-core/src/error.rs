//! Error types for the folio service
//!
//! - [`StoreError`]: document/settings store failures and conditional-update conflicts
//! - [`ConfigError`]: configuration loading
//! - [`FolioError`]: everything a service operation can return

use folio_lifecycle::LifecycleError;
use folio_model::{InstanceId, ModelError, SubjectId, TemplateId};
use folio_projection::ProjectionError;
use folio_versioning::VersionError;

/// Store failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend not reachable; surfaced as is, never retried
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Conditional update on a missing document
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// A live instance already exists for (template, subject)
    #[error("live instance {existing} already exists for template {template} and subject {subject}")]
    DuplicateInstance {
        template: TemplateId,
        subject: SubjectId,
        existing: InstanceId,
    },

    /// Stale `dataVersion` on a data write
    #[error("stale data version for instance {instance}: expected {expected}, stored {stored}")]
    DataConflict {
        instance: InstanceId,
        expected: u64,
        stored: u64,
    },

    /// Template revision moved since it was read
    #[error("template {template} changed concurrently: expected revision {expected}, stored {stored}")]
    TemplateConflict {
        template: TemplateId,
        expected: u64,
        stored: u64,
    },

    /// Archived instances are immutable
    #[error("instance {0} is archived")]
    Archived(InstanceId),
}

impl StoreError {
    /// Create not-found error
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Configuration loading failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid TOML
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid YAML
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Extension is neither TOML nor YAML
    #[error("unsupported config format '{0}' (expected toml, yaml or yml)")]
    UnsupportedFormat(String),
}

/// Main service error type
#[derive(Debug, thiserror::Error)]
pub enum FolioError {
    /// Store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Version resolution or repoint failure
    #[error("version error: {0}")]
    Version(#[from] VersionError),

    /// Invalid structure or data
    #[error("{0}")]
    Model(#[from] ModelError),

    /// Projection cache failure
    #[error("projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// Rollover planning failure
    #[error("rollover error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Configuration failure
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Unknown template id
    #[error("template {0} not found")]
    TemplateNotFound(TemplateId),

    /// Unknown instance id
    #[error("instance {0} not found")]
    InstanceNotFound(InstanceId),

    /// Repoint request names an instance of another template
    #[error("instance {instance} belongs to template {actual}, not {expected}")]
    ForeignInstance {
        instance: InstanceId,
        expected: TemplateId,
        actual: TemplateId,
    },

    /// Rollover found neither sibling nor default templates
    #[error("no template choice for level '{0}'")]
    NoTemplateChoice(String),
}

impl FolioError {
    /// Whether the caller should re-read and retry
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::DataConflict { .. } | StoreError::TemplateConflict { .. })
        )
    }

    /// Whether a referenced entity or version does not exist
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::TemplateNotFound(_) | Self::InstanceNotFound(_) => true,
            Self::Store(StoreError::NotFound { .. }) => true,
            Self::Version(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Whether the request payload was rejected before any mutation
    #[inline]
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::Model(ModelError::StructuralInput { .. } | ModelError::DataValidation { .. })
        )
    }
}

/// Result alias for service operations
pub type FolioResult<T> = Result<T, FolioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_classification() {
        let err: FolioError = StoreError::DataConflict {
            instance: InstanceId::new(),
            expected: 1,
            stored: 2,
        }
        .into();
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
    }

    #[test]
    fn version_not_found_is_not_found() {
        let err: FolioError = VersionError::VersionNotFound {
            template: TemplateId::new(),
            version: 9,
            known: vec![1],
        }
        .into();
        assert!(err.is_not_found());
    }

    #[test]
    fn structural_input_is_invalid_input() {
        let err: FolioError = ModelError::structural("page 0", "bad").into();
        assert!(err.is_invalid_input());
    }
}
