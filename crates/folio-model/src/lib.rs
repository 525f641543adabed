//! Folio data model
//!
//! Templates made of pages of positioned blocks, immutable version
//! snapshots, and per-subject instances holding sparse fill-in data.
//!
//! # Core Concepts
//!
//! - [`Template`]: live structure, `current_version` and append-only history
//! - [`Block`]: `{type, id}` envelope around a [`BlockKind`] variant
//! - [`Instance`]: per-subject materialization pinned to one version
//! - [`InstanceData`]: typed, boundary-validated key/value map
//! - [`DataKey`]: stable-id or legacy positional address inside a data key
//! - [`Fingerprint`]: Blake3 digest for signatures and change detection
//!
//! # Example
//!
//! ```rust
//! use folio_model::{Block, BlockKind, Page, Template};
//!
//! let template = Template::new("Support plan").with_pages(vec![Page::new(vec![
//!     Block::new(BlockKind::Text { content: "Hello".into() }),
//! ])]);
//! assert_eq!(template.current_version, 1);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod block;
mod error;
mod hash;
mod ids;
mod instance;
pub mod key;
mod template;
mod validate;

pub use block::{Block, BlockKind, GridRow, Page, ToggleItem};
pub use error::ModelError;
pub use hash::Fingerprint;
pub use ids::{CycleId, InstanceId, SubjectId, TemplateId};
pub use instance::{
    decode_toggle_items, serialized_len, DataLimits, Instance, InstanceData, InstanceStatus,
};
pub use key::{DataKey, PositionalAddress};
pub use template::{structure_fingerprint, Template, TemplateMetadata, VersionSnapshot};
pub use validate::{validate_pages, StructuralLimits};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn template_and_instance_roundtrip_through_json() {
        let template = Template::new("Plan").with_pages(vec![Page::new(vec![Block::new(
            BlockKind::Toggle {
                label: "Supports".into(),
                items: vec![ToggleItem::new("A1", "Extra time").with_level(2)],
            },
        )
        .with_id("b1")])]);

        let json = serde_json::to_string(&template).unwrap();
        let back: Template = serde_json::from_str(&json).unwrap();
        assert_eq!(back, template);

        let mut instance = Instance::new(&template, SubjectId::new("s1"), CycleId::new("2025"));
        instance
            .data
            .insert("toggle_b1", json!([{"code": "A1", "active": true}]));
        let json = serde_json::to_string(&instance).unwrap();
        let back: Instance = serde_json::from_str(&json).unwrap();
        assert_eq!(back, instance);
    }
}
