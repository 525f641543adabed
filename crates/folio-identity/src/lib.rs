//! Folio Identity Reconciler
//!
//! Keeps block and row ids stable across template edits.
//!
//! # Overview
//!
//! - **Signature**: coarse, size-capped content digest of a block or row
//! - **Reconciler**: reuses previous ids for matching signatures, mints the rest
//! - **IdMinter**: pluggable source of fresh ids
//!
//! # Example
//!
//! ```rust
//! use folio_identity::{reconcile, SequentialMinter};
//! use folio_model::{Block, BlockKind, Page};
//!
//! let minter = SequentialMinter::new();
//! let first = reconcile(&[], vec![Page::new(vec![
//!     Block::new(BlockKind::Text { content: "Goals".into() }),
//! ])], &minter);
//! assert_eq!(first[0].blocks[0].id, "b1");
//!
//! // The same block moved to a new page keeps its id.
//! let moved = vec![Page::default(), Page::new(vec![
//!     Block::new(BlockKind::Text { content: "Goals".into() }),
//! ])];
//! let second = reconcile(&first, moved, &minter);
//! assert_eq!(second[1].blocks[0].id, "b1");
//! ```

#![warn(missing_docs)]

pub mod minter;
pub mod reconcile;
pub mod signature;

// Re-exports
pub use minter::{IdMinter, IdScope, SequentialMinter, UlidMinter};
pub use reconcile::{
    is_valid_id, reconcile, ReconcileReport, Reconciled, Reconciler, SignatureIndex,
};
pub use signature::{Signature, SignatureOptions};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for id reconciliation
    pub use crate::{IdMinter, Reconciler, SequentialMinter, SignatureOptions, UlidMinter};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
