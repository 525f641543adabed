//! Folio Data Merge Projector
//!
//! Combines a template resolved at an instance's pinned version with the
//! instance's sparse data map into a materialized view.
//!
//! # Overview
//!
//! - **Projector**: pure merge over a deep copy of the resolved structure
//! - **ResolverChain**: stable-id addressing first, legacy positional fallback
//! - **ProjectionCache**: moka cache keyed by (template, version, data fingerprint)
//!
//! # Example
//!
//! ```rust
//! use folio_model::{Block, BlockKind, InstanceData, Page, Template, ToggleItem};
//! use folio_projection::Projector;
//! use serde_json::json;
//!
//! let template = Template::new("Plan").with_pages(vec![Page::new(vec![
//!     Block::new(BlockKind::Toggle {
//!         label: "Supports".into(),
//!         items: vec![ToggleItem::new("A", "Extra time")],
//!     })
//!     .with_id("t1"),
//! ])]);
//!
//! let mut data = InstanceData::new();
//! data.insert("toggle_t1", json!([{"code": "A", "label": "Extra time", "active": true}]));
//!
//! let view = Projector::new().project(&template, 1, &data);
//! assert_eq!(view.applied, vec!["toggle_t1"]);
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod projector;
pub mod resolver;

// Re-exports
pub use cache::{CacheStats, ProjectionCache, ProjectionKey};
pub use error::ProjectionError;
pub use projector::{MaterializedView, Projector};
pub use resolver::{
    AddressResolver, Addressing, PositionalResolver, ResolverChain, StableIdResolver,
    StructureIndex, Target,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
