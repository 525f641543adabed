//! Data key address resolution
//!
//! Two strategies behind one trait: stable-id addressing (canonical) and
//! legacy positional addressing (deprecated fallback). A [`ResolverChain`]
//! tries them in priority order and reports which one matched.

use std::collections::HashMap;
use std::fmt::Debug;

use folio_model::{DataKey, Page};

/// Addressing scheme that resolved a key
///
/// Ordered by application: positional overlays are applied first so that
/// stable-id overlays for the same element overwrite them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Addressing {
    /// `{feature}_{page}_{block}[_row_{row}]`
    Positional,
    /// `{feature}_{elementId}[_row_{rowId}]`
    StableId,
}

/// Location inside a page structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Block { page: usize, block: usize },
    Row { page: usize, block: usize, row: usize },
}

/// Stable block id to (page, block) index, built once per merge
#[derive(Debug, Default)]
pub struct StructureIndex {
    blocks: HashMap<String, (usize, usize)>,
}

impl StructureIndex {
    /// Index every block carrying an id; first occurrence wins
    #[must_use]
    pub fn build(pages: &[Page]) -> Self {
        let mut blocks = HashMap::new();
        for (p, page) in pages.iter().enumerate() {
            for (b, block) in page.blocks.iter().enumerate() {
                if !block.id.is_empty() {
                    blocks.entry(block.id.clone()).or_insert((p, b));
                }
            }
        }
        Self { blocks }
    }

    /// Location of a block by stable id
    #[inline]
    #[must_use]
    pub fn block(&self, id: &str) -> Option<(usize, usize)> {
        self.blocks.get(id).copied()
    }

    /// Number of indexed blocks
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether nothing is indexed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Strategy mapping a data key onto a structure location
pub trait AddressResolver: Send + Sync + Debug {
    /// Scheme implemented by this resolver
    fn addressing(&self) -> Addressing;

    /// Resolve the key, or `None` if it names no existing element
    fn resolve(&self, key: &DataKey<'_>, pages: &[Page], index: &StructureIndex)
        -> Option<Target>;

    /// Resolver priority (higher = tried first)
    fn priority(&self) -> i32 {
        0
    }
}

/// Canonical stable-id addressing
#[derive(Debug, Clone, Copy, Default)]
pub struct StableIdResolver;

impl AddressResolver for StableIdResolver {
    fn addressing(&self) -> Addressing {
        Addressing::StableId
    }

    fn resolve(
        &self,
        key: &DataKey<'_>,
        pages: &[Page],
        index: &StructureIndex,
    ) -> Option<Target> {
        let (page, block) = index.block(key.element())?;
        match key.row() {
            None => Some(Target::Block { page, block }),
            Some(row_id) => {
                let row = pages[page].blocks[block].row_position(row_id)?;
                Some(Target::Row { page, block, row })
            }
        }
    }

    fn priority(&self) -> i32 {
        10
    }
}

/// Deprecated positional addressing
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionalResolver;

impl AddressResolver for PositionalResolver {
    fn addressing(&self) -> Addressing {
        Addressing::Positional
    }

    fn resolve(
        &self,
        key: &DataKey<'_>,
        pages: &[Page],
        _index: &StructureIndex,
    ) -> Option<Target> {
        let address = key.positional()?;
        let block = pages.get(address.page)?.blocks.get(address.block)?;
        match address.row {
            None => Some(Target::Block {
                page: address.page,
                block: address.block,
            }),
            Some(row) => (row < block.rows()?.len()).then_some(Target::Row {
                page: address.page,
                block: address.block,
                row,
            }),
        }
    }
}

/// Ordered set of resolvers
pub struct ResolverChain {
    resolvers: Vec<Box<dyn AddressResolver>>,
}

impl Default for ResolverChain {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Debug for ResolverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverChain")
            .field(
                "addressing",
                &self.resolvers.iter().map(|r| r.addressing()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ResolverChain {
    /// Create empty chain
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
        }
    }

    /// Stable-id first, positional fallback
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut chain = Self::new();
        chain.register(StableIdResolver);
        chain.register(PositionalResolver);
        chain
    }

    /// Register a resolver
    pub fn register<R: AddressResolver + 'static>(&mut self, resolver: R) {
        self.resolvers.push(Box::new(resolver));
        self.resolvers
            .sort_by_key(|r| std::cmp::Reverse(r.priority()));
    }

    /// First resolver that maps the key to an element
    #[must_use]
    pub fn resolve(
        &self,
        key: &DataKey<'_>,
        pages: &[Page],
        index: &StructureIndex,
    ) -> Option<(Addressing, Target)> {
        self.resolvers
            .iter()
            .find_map(|r| r.resolve(key, pages, index).map(|t| (r.addressing(), t)))
    }

    /// Number of registered resolvers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Whether the chain is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}
