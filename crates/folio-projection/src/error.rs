//! Error types for projection

use folio_model::ModelError;

/// Errors raised around projection
///
/// Projection itself never fails; only cache keying and maintenance can.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    /// Instance data could not be fingerprinted
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Cache rejected an invalidation predicate
    #[error("cache invalidation failed: {0}")]
    Invalidation(String),
}
