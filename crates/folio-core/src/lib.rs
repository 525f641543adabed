//! Folio Core - template and instance service
//!
//! The service layer over the folio components:
//! - Creates templates and saves new structures with stable ids
//! - Mints versions and propagates or rolls back instances
//! - Writes instance data under optimistic concurrency
//! - Renders instances at their pinned version (cached)
//! - Rolls subjects over into a new cycle with sanitized seed data
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use folio_core::{EnsureInstance, FolioConfig, FolioService, MemoryStore};
//! use folio_model::{CycleId, SubjectId, Template};
//!
//! # async fn example() -> Result<(), folio_core::FolioError> {
//! let store = Arc::new(MemoryStore::new());
//! let service = FolioService::with_store(FolioConfig::default(), store);
//!
//! let template = service.create_template(Template::new("Support plan")).await?;
//! let instance = service
//!     .ensure_instance(EnsureInstance::new(
//!         template.id,
//!         SubjectId::new("s1"),
//!         CycleId::new("2025"),
//!     ))
//!     .await?;
//! let view = service.render(instance.id).await?;
//! println!("rendered version {}", view.version);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod config;
pub mod error;
pub mod memory;
pub mod service;
pub mod store;

// Re-exports for convenience
pub use config::{CacheConfig, FolioConfig};
pub use error::{ConfigError, FolioError, FolioResult, StoreError};
pub use memory::MemoryStore;
pub use service::{
    EnsureInstance, FolioService, IntegrityReport, RepointOutcome, RolloverOutcome,
    RolloverRequest, ENSURE_ATTEMPTS,
};
pub use store::{DocumentStore, DuplicateGroup, InstanceFilter, SettingsStore};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the folio service
    pub use crate::{
        DocumentStore, EnsureInstance, FolioConfig, FolioError, FolioResult, FolioService,
        InstanceFilter, MemoryStore, RolloverRequest, SettingsStore,
    };
    pub use folio_versioning::{PropagationTarget, StructuralEdit};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
