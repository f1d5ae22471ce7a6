//! Headers as nodes of the header tree
//!
//! A [`ChainedHeader`] is a protocol header plus everything derived from its
//! position in the tree: height, cumulative work, a skip-list back-pointer
//! and the memoized deployment states. All of it is fixed at construction.

use super::deployment::ThresholdState;
use shared_types::{BlockHeader, Hash, U256};
use std::sync::Arc;

/// Shared read-only handle to a header owned by the tree.
pub type ChainedHeaderRef = Arc<ChainedHeader>;

/// A header linked into the tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainedHeader {
    hash: Hash,
    header: BlockHeader,
    height: u64,
    chain_work: U256,
    skip: Option<Hash>,
    deployment_states: Vec<ThresholdState>,
}

impl ChainedHeader {
    /// Build the root of the tree.
    pub fn genesis(header: BlockHeader, proof: U256, deployment_states: Vec<ThresholdState>) -> Self {
        Self {
            hash: header.hash(),
            header,
            height: 0,
            chain_work: proof,
            skip: None,
            deployment_states,
        }
    }

    /// Build a child of `parent`.
    ///
    /// `skip` must be the hash of `parent`'s ancestor at
    /// `skip_height(parent.height() + 1)`.
    pub fn extend(
        parent: &ChainedHeader,
        header: BlockHeader,
        proof: U256,
        skip: Option<Hash>,
        deployment_states: Vec<ThresholdState>,
    ) -> Self {
        Self {
            hash: header.hash(),
            header,
            height: parent.height + 1,
            chain_work: parent.chain_work.saturating_add(proof),
            skip,
            deployment_states,
        }
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn parent_hash(&self) -> Hash {
        self.header.parent_hash
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn timestamp(&self) -> u64 {
        self.header.timestamp
    }

    /// Cumulative work from genesis up to and including this header.
    pub fn chain_work(&self) -> U256 {
        self.chain_work
    }

    /// Skip-list ancestor, `None` for genesis.
    pub fn skip(&self) -> Option<Hash> {
        self.skip
    }

    /// Deployment states governing this header's children, by deployment index.
    pub fn deployment_states(&self) -> &[ThresholdState] {
        &self.deployment_states
    }

    pub fn deployment_state(&self, index: usize) -> Option<ThresholdState> {
        self.deployment_states.get(index).copied()
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}

fn invert_lowest_one(n: u64) -> u64 {
    n & n.wrapping_sub(1)
}

/// Height of the skip-list ancestor for a header at `height`.
///
/// Chosen so that any ancestor is reachable in O(log n) hops.
pub fn skip_height(height: u64) -> u64 {
    if height < 2 {
        return 0;
    }
    if height & 1 == 1 {
        invert_lowest_one(invert_lowest_one(height - 1)) + 1
    } else {
        invert_lowest_one(height)
    }
}
