//! Folio Version Store & Propagation Controller
//!
//! Immutable structural versions of a template, and the decision of which
//! instances follow a newly minted version.
//!
//! # Core Concepts
//!
//! - [`VersionStore`]: resolve, enumerate and archive versions of a template
//! - [`PropagationController`]: classify saves, plan minting, validate repoints
//! - [`PropagationTarget`]: `"all"`, `"none"` or an explicit instance set
//!
//! # Example
//!
//! ```rust
//! use folio_model::{Block, BlockKind, Page, Template};
//! use folio_versioning::{PropagationController, StructuralEdit, VersionStore};
//!
//! let mut template = Template::new("Plan");
//! let controller = PropagationController::new();
//! let edit = StructuralEdit::new(vec![Page::new(vec![
//!     Block::new(BlockKind::Divider).with_id("b1"),
//! ])]);
//!
//! // One instance references the template, so the edit mints version 2.
//! let plan = controller.plan(&template, &edit, 1).unwrap();
//! controller.apply(&mut template, edit, &plan, []).unwrap();
//! assert_eq!(template.current_version, 2);
//! assert!(template.has_version(1));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod propagation;
mod store;

// Re-exports
pub use error::VersionError;
pub use propagation::{
    ChangeKind, PropagationController, PropagationTarget, RepointPlan, SaveOutcome, SavePlan,
    StructuralEdit,
};
pub use store::{ResolvedVersion, VersionSource, VersionStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
