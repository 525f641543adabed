//! Error types for rollover planning

use folio_model::ModelError;

/// Errors raised while planning a rollover
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// A data value could not be measured
    #[error(transparent)]
    Model(#[from] ModelError),
}
