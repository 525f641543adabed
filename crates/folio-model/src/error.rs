//! Error types for the data model

/// Errors raised while validating or encoding model values
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Malformed page/block payload; the save is rejected before mutation
    #[error("malformed structure at {location}: {reason}")]
    StructuralInput { location: String, reason: String },

    /// Instance data rejected at the write boundary
    #[error("invalid data for key '{key}': {reason}")]
    DataValidation { key: String, reason: String },

    /// Fingerprint text could not be decoded
    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    /// JSON encoding failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ModelError {
    /// Create a structural input error
    pub fn structural(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StructuralInput {
            location: location.into(),
            reason: reason.into(),
        }
    }

    /// Create a data validation error
    pub fn data(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataValidation {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
