//! Stable id reconciliation
//!
//! Given the previous structure and a freshly edited next structure where
//! some elements lack ids, assign every block and row a non-empty stable id,
//! reusing previous ids for elements whose signature matches.
//!
//! # Algorithm
//! 1. Index previous blocks as signature -> FIFO queue of ids (document order)
//! 2. Claim every valid id already present in `next` (first occurrence wins;
//!    later duplicates count as missing)
//! 3. For each block still lacking an id, pop the next unclaimed candidate
//!    with the same signature, or mint a fresh id
//! 4. For each container block whose row id list is missing, short,
//!    long, empty-entried or duplicated, re-derive the whole list the same
//!    way against the previous block carrying the same id
//!
//! Ties among equal signatures resolve by first-seen order. This is an
//! approximation of identity, not a structural diff.

use std::collections::{HashMap, HashSet, VecDeque};

use folio_model::{Block, GridRow, Page};
use indexmap::IndexMap;

use crate::minter::{IdMinter, IdScope};
use crate::signature::{Signature, SignatureOptions};

/// Mint attempts before a collision suffix is appended
const MINT_ATTEMPTS: usize = 16;

/// Signature -> ids in first-seen order
#[derive(Debug, Default)]
pub struct SignatureIndex {
    queues: IndexMap<Signature, VecDeque<String>>,
}

impl SignatureIndex {
    /// Create empty index
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the blocks of a structure
    #[must_use]
    pub fn of_blocks<'a>(
        blocks: impl IntoIterator<Item = &'a Block>,
        options: &SignatureOptions,
    ) -> Self {
        let mut index = Self::new();
        for block in blocks {
            if is_valid_id(&block.id) {
                index.push(Signature::of_block(block, options), block.id.clone());
            }
        }
        index
    }

    /// Index the rows of a container block
    #[must_use]
    pub fn of_rows(block: &Block, options: &SignatureOptions) -> Self {
        let mut index = Self::new();
        let rows: &[GridRow] = block.rows().unwrap_or_default();
        for (row, id) in rows.iter().zip(&block.row_ids) {
            if is_valid_id(id) {
                index.push(Signature::of_row(row, options), id.clone());
            }
        }
        index
    }

    /// Append an id to the queue of a signature
    pub fn push(&mut self, signature: Signature, id: String) {
        self.queues.entry(signature).or_default().push_back(id);
    }

    /// Pop the first queued id for `signature` not already claimed
    pub fn pop_unclaimed(
        &mut self,
        signature: &Signature,
        claimed: &HashSet<String>,
    ) -> Option<String> {
        let queue = self.queues.get_mut(signature)?;
        while let Some(id) = queue.pop_front() {
            if !claimed.contains(&id) {
                return Some(id);
            }
        }
        None
    }

    /// Number of ids still queued
    #[must_use]
    pub fn len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    /// Whether no ids are queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Counts of what reconciliation did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Blocks that already carried a valid id
    pub blocks_kept: usize,
    /// Blocks that inherited a previous id by signature
    pub blocks_matched: usize,
    /// Blocks that received a fresh id
    pub blocks_minted: usize,
    /// Rows whose id list was already valid
    pub rows_kept: usize,
    /// Rows that inherited a previous id by signature
    pub rows_matched: usize,
    /// Rows that received a fresh id
    pub rows_minted: usize,
}

/// Reconciled structure plus statistics
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    /// Structure with every block and row id assigned
    pub pages: Vec<Page>,
    /// What was kept, matched and minted
    pub report: ReconcileReport,
}

/// Stable id reconciler
///
/// Pure apart from the minter. Callers persisting the result must run it
/// inside the same critical section as the save it feeds.
pub struct Reconciler<'m> {
    minter: &'m dyn IdMinter,
    options: SignatureOptions,
}

impl std::fmt::Debug for Reconciler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<'m> Reconciler<'m> {
    /// Create reconciler with default signature options
    #[inline]
    #[must_use]
    pub fn new(minter: &'m dyn IdMinter) -> Self {
        Self {
            minter,
            options: SignatureOptions::default(),
        }
    }

    /// Override signature options
    #[inline]
    #[must_use]
    pub fn with_options(mut self, options: SignatureOptions) -> Self {
        self.options = options;
        self
    }

    /// Assign stable ids to every block and row of `next`
    #[must_use]
    pub fn reconcile(&self, previous: &[Page], mut next: Vec<Page>) -> Reconciled {
        let mut report = ReconcileReport::default();
        self.reconcile_blocks(previous, &mut next, &mut report);
        self.reconcile_rows(previous, &mut next, &mut report);
        tracing::debug!(
            blocks_kept = report.blocks_kept,
            blocks_matched = report.blocks_matched,
            blocks_minted = report.blocks_minted,
            rows_kept = report.rows_kept,
            rows_matched = report.rows_matched,
            rows_minted = report.rows_minted,
            "reconciled structure ids"
        );
        Reconciled {
            pages: next,
            report,
        }
    }

    fn reconcile_blocks(
        &self,
        previous: &[Page],
        next: &mut [Page],
        report: &mut ReconcileReport,
    ) {
        let previous_blocks = previous.iter().flat_map(|p| p.blocks.iter());
        let mut index = SignatureIndex::of_blocks(previous_blocks.clone(), &self.options);
        let reserved: HashSet<String> = previous_blocks
            .filter(|b| is_valid_id(&b.id))
            .map(|b| b.id.clone())
            .collect();

        let mut claimed = HashSet::new();
        let mut pending = Vec::new();
        for (p, page) in next.iter().enumerate() {
            for (b, block) in page.blocks.iter().enumerate() {
                if is_valid_id(&block.id) && claimed.insert(block.id.clone()) {
                    report.blocks_kept += 1;
                } else {
                    pending.push((p, b));
                }
            }
        }

        for (p, b) in pending {
            let block = &mut next[p].blocks[b];
            let signature = Signature::of_block(block, &self.options);
            let id = if let Some(id) = index.pop_unclaimed(&signature, &claimed) {
                report.blocks_matched += 1;
                id
            } else {
                report.blocks_minted += 1;
                self.fresh_id(IdScope::Block, &claimed, &reserved)
            };
            claimed.insert(id.clone());
            block.id = id;
        }
    }

    fn reconcile_rows(&self, previous: &[Page], next: &mut [Page], report: &mut ReconcileReport) {
        let previous_containers: HashMap<&str, &Block> = previous
            .iter()
            .flat_map(|p| p.blocks.iter())
            .filter(|b| b.is_container() && is_valid_id(&b.id))
            .map(|b| (b.id.as_str(), b))
            .collect();

        for block in next.iter_mut().flat_map(|p| p.blocks.iter_mut()) {
            if !block.is_container() {
                block.row_ids.clear();
                continue;
            }
            let rows: &[GridRow] = block.rows().unwrap_or_default();
            if row_ids_valid(&block.row_ids, rows.len()) {
                report.rows_kept += rows.len();
                continue;
            }

            let prior = previous_containers.get(block.id.as_str()).copied();
            let mut index = prior
                .map(|prev| SignatureIndex::of_rows(prev, &self.options))
                .unwrap_or_default();
            let reserved: HashSet<String> = prior
                .map(|prev| prev.row_ids.iter().cloned().collect())
                .unwrap_or_default();

            let mut claimed = HashSet::new();
            let mut ids = Vec::with_capacity(rows.len());
            for row in rows {
                let signature = Signature::of_row(row, &self.options);
                let id = if let Some(id) = index.pop_unclaimed(&signature, &claimed) {
                    report.rows_matched += 1;
                    id
                } else {
                    report.rows_minted += 1;
                    self.fresh_id(IdScope::Row, &claimed, &reserved)
                };
                claimed.insert(id.clone());
                ids.push(id);
            }
            block.row_ids = ids;
        }
    }

    /// Mint an id that collides with neither claimed nor previous ids
    fn fresh_id(
        &self,
        scope: IdScope,
        claimed: &HashSet<String>,
        reserved: &HashSet<String>,
    ) -> String {
        let mut candidate = self.minter.mint(scope);
        let mut attempt = 0;
        loop {
            if is_valid_id(&candidate)
                && !claimed.contains(&candidate)
                && !reserved.contains(&candidate)
            {
                return candidate;
            }
            attempt += 1;
            candidate = if attempt < MINT_ATTEMPTS {
                self.minter.mint(scope)
            } else {
                format!("{}x{attempt}", self.minter.mint(scope))
            };
        }
    }
}

/// Convenience wrapper with default options
#[must_use]
pub fn reconcile(previous: &[Page], next: Vec<Page>, minter: &dyn IdMinter) -> Vec<Page> {
    Reconciler::new(minter).reconcile(previous, next).pages
}

/// A stable id is any non-blank string
#[inline]
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    !id.trim().is_empty()
}

fn row_ids_valid(ids: &[String], row_count: usize) -> bool {
    if ids.len() != row_count {
        return false;
    }
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().all(|id| is_valid_id(id) && seen.insert(id.as_str()))
}
