//! Fresh id minting
//!
//! Minting is the only non-deterministic step of reconciliation, so it sits
//! behind [`IdMinter`]. Production code uses [`UlidMinter`]; tests use
//! [`SequentialMinter`] to get readable, predictable ids.

use std::sync::atomic::{AtomicU64, Ordering};

use ulid::Ulid;

/// What an id is minted for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdScope {
    /// A block on a page
    Block,
    /// A row inside a container block
    Row,
}

impl IdScope {
    /// Short prefix used in minted ids
    #[inline]
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Block => "b",
            Self::Row => "r",
        }
    }
}

/// Source of fresh ids
///
/// Minted ids must be non-empty and must not contain `_`, which is the
/// data key separator.
pub trait IdMinter: Send + Sync {
    /// Produce a new id for the given scope
    fn mint(&self, scope: IdScope) -> String;
}

/// ULID-backed minter (`b-01h...`, `r-01h...`)
#[derive(Debug, Clone, Copy, Default)]
pub struct UlidMinter;

impl IdMinter for UlidMinter {
    fn mint(&self, scope: IdScope) -> String {
        format!("{}-{}", scope.prefix(), Ulid::new().to_string().to_lowercase())
    }
}

/// Counter-backed minter (`b1`, `b2`, ..., `r1`, `r2`, ...)
#[derive(Debug, Default)]
pub struct SequentialMinter {
    blocks: AtomicU64,
    rows: AtomicU64,
}

impl SequentialMinter {
    /// Create minter starting at 1 for both scopes
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdMinter for SequentialMinter {
    fn mint(&self, scope: IdScope) -> String {
        let counter = match scope {
            IdScope::Block => &self.blocks,
            IdScope::Row => &self.rows,
        };
        let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}{n}", scope.prefix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_minter_counts_per_scope() {
        let minter = SequentialMinter::new();
        assert_eq!(minter.mint(IdScope::Row), "r1");
        assert_eq!(minter.mint(IdScope::Row), "r2");
        assert_eq!(minter.mint(IdScope::Block), "b1");
    }

    #[test]
    fn ulid_minter_ids_are_unique_and_key_safe() {
        let minter = UlidMinter;
        let a = minter.mint(IdScope::Block);
        let b = minter.mint(IdScope::Block);
        assert_ne!(a, b);
        assert!(a.starts_with("b-"));
        assert!(!a.contains('_'));
    }
}
