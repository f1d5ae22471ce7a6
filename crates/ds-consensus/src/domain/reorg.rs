//! Reorganization executor
//!
//! Moves the active chain from one tip to another through storage, and
//! restores the old tip if any step fails. Storage never observes a chain
//! that is neither the old one nor the new one once `reorganize` returns.

use super::chained_header::ChainedHeaderRef;
use super::error::{ConsensusError, ConsensusResult};
use super::tree::ChainedHeaderTree;
use crate::ports::ChainStorage;
use serde::{Deserialize, Serialize};
use shared_types::{short_hash, Hash};

/// Changes to the active chain made by one tip switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDelta {
    pub fork_point: Hash,
    /// Removed blocks, highest first.
    pub disconnected: Vec<Hash>,
    /// Added blocks, lowest first.
    pub connected: Vec<Hash>,
    pub new_tip: Hash,
}

impl ChainDelta {
    /// Number of blocks rolled back.
    pub fn depth(&self) -> u64 {
        self.disconnected.len() as u64
    }

    /// Whether the new tip simply extends the old one.
    pub fn is_extension(&self) -> bool {
        self.disconnected.is_empty()
    }
}

/// Applies tip switches against [`ChainStorage`].
#[derive(Debug, Clone)]
pub struct ReorgExecutor {
    max_reorg_depth: u64,
}

impl ReorgExecutor {
    pub fn new(max_reorg_depth: u64) -> Self {
        Self { max_reorg_depth }
    }

    pub fn max_reorg_depth(&self) -> u64 {
        self.max_reorg_depth
    }

    /// Compute the delta from `old_tip` to `new_tip` without touching storage.
    pub fn plan(
        &self,
        tree: &ChainedHeaderTree,
        old_tip: &Hash,
        new_tip: &Hash,
    ) -> ConsensusResult<ChainDelta> {
        let fork = tree.find_fork(old_tip, new_tip)?;
        let old = tree
            .get(old_tip)
            .ok_or(ConsensusError::UnknownHeader(*old_tip))?;

        let depth = old.height() - fork.height();
        if depth > self.max_reorg_depth {
            return Err(ConsensusError::MaxReorgViolation {
                depth,
                max_depth: self.max_reorg_depth,
            });
        }

        let disconnected = branch_above(tree, old_tip, &fork)?;
        let mut connected = branch_above(tree, new_tip, &fork)?;
        connected.reverse();

        Ok(ChainDelta {
            fork_point: fork.hash(),
            disconnected,
            connected,
            new_tip: *new_tip,
        })
    }

    /// Switch storage from `old_tip` to `new_tip`.
    ///
    /// On failure storage is back at `old_tip`.
    pub fn reorganize<S: ChainStorage + ?Sized>(
        &self,
        tree: &ChainedHeaderTree,
        old_tip: &Hash,
        new_tip: &Hash,
        storage: &S,
    ) -> ConsensusResult<ChainDelta> {
        let delta = self.plan(tree, old_tip, new_tip)?;

        if !delta.is_extension() {
            tracing::info!(
                depth = delta.depth(),
                fork = %short_hash(&delta.fork_point),
                old_tip = %short_hash(old_tip),
                new_tip = %short_hash(new_tip),
                "Reorganizing"
            );
        }

        for (index, hash) in delta.disconnected.iter().enumerate() {
            if let Err(source) = storage.rollback_block(hash) {
                tracing::error!(hash = %short_hash(hash), error = %source, "Rollback failed, restoring old tip");
                let undone = &delta.disconnected[..index];
                reapply(storage, undone.iter().rev());
                return Err(ConsensusError::Storage(source));
            }
        }

        for (index, hash) in delta.connected.iter().enumerate() {
            if let Err(source) = storage.apply_block(hash) {
                let height = tree.get(hash).map(|h| h.height()).unwrap_or_default();
                tracing::warn!(
                    hash = %short_hash(hash),
                    height,
                    error = %source,
                    "Block failed to connect, restoring old tip"
                );
                unwind(storage, delta.connected[..index].iter().rev());
                reapply(storage, delta.disconnected.iter().rev());
                return Err(ConsensusError::ConnectBlockFailed {
                    hash: *hash,
                    height,
                    source,
                });
            }
        }

        Ok(delta)
    }
}

/// Hashes from `tip` down to (excluding) `fork`, highest first.
fn branch_above(
    tree: &ChainedHeaderTree,
    tip: &Hash,
    fork: &ChainedHeaderRef,
) -> ConsensusResult<Vec<Hash>> {
    let mut hashes = Vec::new();
    let mut cursor = tree.get(tip).ok_or(ConsensusError::UnknownHeader(*tip))?;
    while cursor.height() > fork.height() {
        hashes.push(cursor.hash());
        let parent = cursor.parent_hash();
        cursor = tree.get(&parent).ok_or(ConsensusError::UnknownHeader(parent))?;
    }
    Ok(hashes)
}

fn unwind<'a, S: ChainStorage + ?Sized>(storage: &S, hashes: impl Iterator<Item = &'a Hash>) {
    for hash in hashes {
        if let Err(e) = storage.rollback_block(hash) {
            tracing::error!(hash = %short_hash(hash), error = %e, "Rollback during recovery failed");
        }
    }
}

fn reapply<'a, S: ChainStorage + ?Sized>(storage: &S, hashes: impl Iterator<Item = &'a Hash>) {
    for hash in hashes {
        if let Err(e) = storage.apply_block(hash) {
            tracing::error!(hash = %short_hash(hash), error = %e, "Reapply during recovery failed");
        }
    }
}
