//! Chained header tree
//!
//! Every header the node has accepted, arranged by parent links and addressed
//! by hash. Headers are never removed; bad branches are marked invalid.
//!
//! INVARIANTS:
//! - every non-genesis header's parent is present
//! - exactly one root (genesis)
//! - heights strictly increase along parent links

use super::chained_header::{skip_height, ChainedHeader, ChainedHeaderRef};
use super::deployment::ThresholdState;
use super::error::{ConsensusError, ConsensusErrorKind, ConsensusResult};
use lru::LruCache;
use shared_types::{BlockHeader, Hash, PeerId, U256};
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Rejected hashes remembered outside the tree.
pub const MAX_REJECTED_HEADERS: usize = 16_384;

/// Why a header was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidMark {
    /// The header that failed, itself or an ancestor.
    pub origin: Hash,
    /// Failure kind of `origin`.
    pub kind: ConsensusErrorKind,
}

/// Mutable side status of a header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderStatus {
    /// Full block data has been received.
    pub has_block_data: bool,
    /// Block data is available for this header and all its ancestors.
    pub chain_data: bool,
    pub invalid: Option<InvalidMark>,
}

/// Header tree plus the index of the active chain.
#[derive(Debug)]
pub struct ChainedHeaderTree {
    headers: HashMap<Hash, ChainedHeaderRef>,
    children: HashMap<Hash, Vec<Hash>>,
    tips: HashSet<Hash>,
    status: HashMap<Hash, HeaderStatus>,
    /// Peer that delivered each block body.
    sources: HashMap<Hash, PeerId>,
    /// Valid headers with chain data and no valid child with chain data.
    candidates: HashSet<Hash>,
    /// Headers rejected before they could be linked in, least recent evicted.
    rejected: LruCache<Hash, ConsensusErrorKind>,
    /// Hash at each height of the active chain.
    active: Vec<Hash>,
    genesis: Hash,
}

impl ChainedHeaderTree {
    /// Create a tree rooted at `genesis`, which is also the active tip.
    pub fn new(genesis: BlockHeader, proof: U256, deployment_states: Vec<ThresholdState>) -> Self {
        Self::with_rejected_capacity(genesis, proof, deployment_states, MAX_REJECTED_HEADERS)
    }

    /// Like [`ChainedHeaderTree::new`] with a custom bound on remembered
    /// rejections.
    pub fn with_rejected_capacity(
        genesis: BlockHeader,
        proof: U256,
        deployment_states: Vec<ThresholdState>,
        rejected_capacity: usize,
    ) -> Self {
        let root = Arc::new(ChainedHeader::genesis(genesis, proof, deployment_states));
        let hash = root.hash();

        let mut status = HashMap::new();
        status.insert(
            hash,
            HeaderStatus {
                has_block_data: true,
                chain_data: true,
                invalid: None,
            },
        );

        Self {
            headers: HashMap::from([(hash, root)]),
            children: HashMap::new(),
            tips: HashSet::from([hash]),
            status,
            sources: HashMap::new(),
            candidates: HashSet::from([hash]),
            rejected: LruCache::new(
                NonZeroUsize::new(rejected_capacity.max(1)).unwrap_or(NonZeroUsize::MIN),
            ),
            active: vec![hash],
            genesis: hash,
        }
    }

    /// Link `header` under its parent.
    ///
    /// A header that is already present is returned unchanged.
    pub fn insert(
        &mut self,
        header: BlockHeader,
        deployment_states: Vec<ThresholdState>,
        proof: U256,
    ) -> ConsensusResult<ChainedHeaderRef> {
        let hash = header.hash();
        if let Some(existing) = self.headers.get(&hash) {
            return Ok(existing.clone());
        }

        let parent_hash = header.parent_hash;
        let parent = self
            .headers
            .get(&parent_hash)
            .cloned()
            .ok_or(ConsensusError::OrphanHeader {
                hash,
                parent: parent_hash,
            })?;

        let skip = self
            .get_ancestor(&parent_hash, skip_height(parent.height() + 1))
            .ok()
            .map(|ancestor| ancestor.hash());
        let chained = Arc::new(ChainedHeader::extend(
            &parent,
            header,
            proof,
            skip,
            deployment_states,
        ));

        let inherited = self.invalid_mark(&parent_hash);
        self.status.insert(
            hash,
            HeaderStatus {
                invalid: inherited,
                ..Default::default()
            },
        );
        self.headers.insert(hash, chained.clone());
        self.children.entry(parent_hash).or_default().push(hash);
        self.tips.remove(&parent_hash);
        self.tips.insert(hash);

        tracing::trace!(height = chained.height(), hash = %shared_types::short_hash(&hash), "Header linked");
        Ok(chained)
    }

    pub fn get(&self, hash: &Hash) -> Option<ChainedHeaderRef> {
        self.headers.get(hash).cloned()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.headers.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn genesis(&self) -> ChainedHeaderRef {
        self.headers[&self.genesis].clone()
    }

    /// Headers with no known child.
    pub fn tips(&self) -> Vec<ChainedHeaderRef> {
        self.tips
            .iter()
            .filter_map(|hash| self.headers.get(hash).cloned())
            .collect()
    }

    pub fn children(&self, hash: &Hash) -> &[Hash] {
        self.children.get(hash).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ancestor of `hash` at `height` (the header itself at its own height).
    pub fn get_ancestor(&self, hash: &Hash, height: u64) -> ConsensusResult<ChainedHeaderRef> {
        let mut walk = self
            .headers
            .get(hash)
            .ok_or(ConsensusError::UnknownHeader(*hash))?;
        if height > walk.height() {
            return Err(ConsensusError::HeightNotFound {
                hash: *hash,
                height,
                header_height: walk.height(),
            });
        }

        while walk.height() > height {
            let walk_height = walk.height();
            let skip_here = skip_height(walk_height);
            let skip_prev = skip_height(walk_height - 1);
            let take_skip = walk.skip().is_some()
                && (skip_here == height
                    || (skip_here > height
                        && !(skip_prev + 2 < skip_here && skip_prev >= height)));
            let next = if take_skip {
                walk.skip()
            } else {
                Some(walk.parent_hash())
            };
            walk = next
                .and_then(|h| self.headers.get(&h))
                .ok_or(ConsensusError::UnknownHeader(*hash))?;
        }
        Ok(walk.clone())
    }

    /// Last common ancestor of `a` and `b`.
    pub fn find_fork(&self, a: &Hash, b: &Hash) -> ConsensusResult<ChainedHeaderRef> {
        let a = self.get(a).ok_or(ConsensusError::UnknownHeader(*a))?;
        let b = self.get(b).ok_or(ConsensusError::UnknownHeader(*b))?;

        let height = a.height().min(b.height());
        let mut a = self.get_ancestor(&a.hash(), height)?;
        let mut b = self.get_ancestor(&b.hash(), height)?;

        while a.hash() != b.hash() {
            a = self.parent_of(&a)?;
            b = self.parent_of(&b)?;
        }
        Ok(a)
    }

    fn parent_of(&self, header: &ChainedHeader) -> ConsensusResult<ChainedHeaderRef> {
        self.get(&header.parent_hash())
            .ok_or(ConsensusError::UnknownHeader(header.parent_hash()))
    }

    /// Timestamps of `hash` and up to `count - 1` of its ancestors.
    pub fn recent_timestamps(&self, hash: &Hash, count: usize) -> ConsensusResult<Vec<u64>> {
        let mut times = Vec::with_capacity(count);
        let mut cursor = Some(self.get(hash).ok_or(ConsensusError::UnknownHeader(*hash))?);
        while let Some(header) = cursor {
            if times.len() == count {
                break;
            }
            times.push(header.timestamp());
            cursor = if header.is_genesis() {
                None
            } else {
                self.get(&header.parent_hash())
            };
        }
        Ok(times)
    }

    /// Median timestamp of `hash` and its `span - 1` predecessors.
    pub fn median_time_past(&self, hash: &Hash, span: usize) -> ConsensusResult<u64> {
        Ok(median(self.recent_timestamps(hash, span.max(1))?))
    }

    // =========================================================================
    // Validity
    // =========================================================================

    /// Mark `hash` invalid and every descendant as having an invalid ancestor.
    ///
    /// Headers not (yet) in the tree are remembered so that re-announcements
    /// fail fast, up to [`MAX_REJECTED_HEADERS`] of them.
    pub fn mark_invalid(&mut self, hash: &Hash, kind: ConsensusErrorKind) {
        let Some(header) = self.headers.get(hash).cloned() else {
            self.rejected.put(*hash, kind);
            return;
        };

        let mark = InvalidMark {
            origin: *hash,
            kind,
        };
        let mut stack = vec![*hash];
        let mut marked = 0usize;
        while let Some(current) = stack.pop() {
            let status = self.status.entry(current).or_default();
            if status.invalid.is_none() {
                status.invalid = Some(mark);
                marked += 1;
            }
            self.candidates.remove(&current);
            stack.extend(self.children(&current).iter().copied());
        }

        // the valid parent may be a frontier again
        if !header.is_genesis() {
            let parent = header.parent_hash();
            if self.has_chain_data(&parent) && !self.is_invalid(&parent) {
                self.candidates.insert(parent);
            }
        }
        tracing::debug!(
            hash = %shared_types::short_hash(hash),
            kind = kind.as_str(),
            marked,
            "Branch marked invalid"
        );
    }

    pub fn is_invalid(&self, hash: &Hash) -> bool {
        self.invalid_mark(hash).is_some()
    }

    pub fn invalid_mark(&self, hash: &Hash) -> Option<InvalidMark> {
        if let Some(kind) = self.rejected.peek(hash) {
            return Some(InvalidMark {
                origin: *hash,
                kind: *kind,
            });
        }
        self.status.get(hash).and_then(|s| s.invalid)
    }

    pub fn status(&self, hash: &Hash) -> Option<HeaderStatus> {
        self.status.get(hash).copied()
    }

    /// Number of rejected hashes currently remembered outside the tree.
    pub fn rejected_len(&self) -> usize {
        self.rejected.len()
    }

    // =========================================================================
    // Block data
    // =========================================================================

    /// Record that the full block for `hash` is available.
    pub fn set_block_data(&mut self, hash: &Hash) -> ConsensusResult<()> {
        let parent_complete = {
            let header = self.get(hash).ok_or(ConsensusError::UnknownHeader(*hash))?;
            header.is_genesis()
                || self
                    .status
                    .get(&header.parent_hash())
                    .map(|s| s.chain_data)
                    .unwrap_or(false)
        };

        let status = self.status.entry(*hash).or_default();
        status.has_block_data = true;
        if !parent_complete || status.chain_data {
            return Ok(());
        }

        // Data for this header may complete descendants that arrived earlier.
        let mut stack = vec![*hash];
        while let Some(current) = stack.pop() {
            let status = self.status.entry(current).or_default();
            if !status.has_block_data {
                continue;
            }
            status.chain_data = true;
            if status.invalid.is_none() {
                self.candidates.insert(current);
                if let Some(parent) = self.headers.get(&current).map(|h| h.parent_hash()) {
                    self.candidates.remove(&parent);
                }
            }
            stack.extend(self.children(&current).iter().copied());
        }
        Ok(())
    }

    /// Record the peer that delivered the block body for `hash`.
    pub fn set_block_source(&mut self, hash: &Hash, peer: &PeerId) {
        self.sources.entry(*hash).or_insert_with(|| peer.clone());
    }

    pub fn block_source(&self, hash: &Hash) -> Option<&PeerId> {
        self.sources.get(hash)
    }

    /// Valid headers with chain data that no valid, connectable child
    /// extends: the tips best-chain selection has to compare.
    pub fn candidates(&self) -> Vec<ChainedHeaderRef> {
        self.candidates
            .iter()
            .filter_map(|hash| self.headers.get(hash).cloned())
            .collect()
    }

    pub fn has_block_data(&self, hash: &Hash) -> bool {
        self.status
            .get(hash)
            .map(|s| s.has_block_data)
            .unwrap_or(false)
    }

    /// Whether block data is present for `hash` and all its ancestors.
    pub fn has_chain_data(&self, hash: &Hash) -> bool {
        self.status.get(hash).map(|s| s.chain_data).unwrap_or(false)
    }

    // =========================================================================
    // Active chain
    // =========================================================================

    /// Make `hash` the tip of the active chain.
    pub fn set_active_tip(&mut self, hash: &Hash) -> ConsensusResult<()> {
        let mut cursor = self.get(hash).ok_or(ConsensusError::UnknownHeader(*hash))?;
        let mut branch = Vec::new();
        while self.active.get(cursor.height() as usize) != Some(&cursor.hash()) {
            branch.push(cursor.hash());
            cursor = self.parent_of(&cursor)?;
        }
        self.active.truncate(cursor.height() as usize + 1);
        self.active.extend(branch.into_iter().rev());
        Ok(())
    }

    pub fn active_tip(&self) -> ChainedHeaderRef {
        self.active
            .last()
            .and_then(|hash| self.get(hash))
            .unwrap_or_else(|| self.genesis())
    }

    /// Header of the active chain at `height`.
    pub fn active_at(&self, height: u64) -> Option<ChainedHeaderRef> {
        self.active
            .get(height as usize)
            .and_then(|hash| self.get(hash))
    }

    pub fn is_active(&self, hash: &Hash) -> bool {
        self.get(hash)
            .map(|h| self.active.get(h.height() as usize) == Some(hash))
            .unwrap_or(false)
    }
}

/// Median of `values` (upper median for even counts, 0 when empty).
pub fn median(mut values: Vec<u64>) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.sort_unstable();
    values[values.len() / 2]
}
