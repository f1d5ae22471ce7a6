//! # Best-Chain Selection
//!
//! Most-cumulative-work rule over the tips of the header tree.
//!
//! ## Candidates
//!
//! A branch only counts as far as it can actually be connected: up to its
//! deepest header that is not marked invalid and whose block data (and that
//! of every ancestor) is available. The tree keeps that frontier up to date
//! as block data arrives and branches are marked invalid, so selection never
//! walks header-only suffixes.
//!
//! ## Ordering
//!
//! 1. Strictly greater `chain_work` wins
//! 2. Exact tie: the lexicographically lower hash wins
//!
//! Both rules depend only on tree contents, so every node holding the same
//! headers selects the same tip regardless of arrival order.

use super::chained_header::ChainedHeaderRef;
use super::tree::ChainedHeaderTree;
use std::cmp::Ordering;

/// Stateless best-chain selector.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestChainSelector;

impl BestChainSelector {
    /// Pick the best candidate tip in `tree`.
    ///
    /// Genesis is always a candidate, so a tree always has a best tip.
    pub fn select_best(tree: &ChainedHeaderTree) -> ChainedHeaderRef {
        let mut best = tree.genesis();
        for candidate in tree.candidates() {
            if Self::compare(&candidate, &best) == Ordering::Greater {
                best = candidate;
            }
        }
        best
    }

    /// Preference order: more work, then lower hash.
    pub fn compare(a: &ChainedHeaderRef, b: &ChainedHeaderRef) -> Ordering {
        a.chain_work()
            .cmp(&b.chain_work())
            .then_with(|| b.hash().cmp(&a.hash()))
    }
}
