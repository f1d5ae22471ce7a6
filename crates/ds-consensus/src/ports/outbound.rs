//! Driven ports (Outbound dependencies)
//!
//! Everything the engine needs from the rest of the node. All calls are
//! synchronous and made while the engine holds its writer lock.

use crate::domain::{ChainDelta, ConsensusErrorKind};
use shared_types::{Block, BlockHeader, Hash, PeerId, StorageError, U256};

/// Block/UTXO storage engine.
///
/// Applying or rolling back a block happens atomically on the storage side;
/// the engine sequences the calls for a whole reorganization.
pub trait ChainStorage: Send + Sync {
    /// Persist a block body so it can be applied later.
    fn store_block(&self, block: &Block) -> Result<(), StorageError>;

    /// Apply the block's state changes on top of the current tip.
    fn apply_block(&self, hash: &Hash) -> Result<(), StorageError>;

    /// Undo the block's state changes. Must be safe to call again for a
    /// block that has already been rolled back.
    fn rollback_block(&self, hash: &Hash) -> Result<(), StorageError>;
}

/// Connection management.
pub trait PeerManager: Send + Sync {
    /// The active chain changed.
    fn on_chain_delta(&self, delta: &ChainDelta);

    /// `peer` supplied data that failed with `kind`.
    fn penalize(&self, peer: &PeerId, kind: ConsensusErrorKind);
}

/// Pluggable proof primitive (PoW hash check or PoS kernel).
pub trait ProofVerifier: Send + Sync {
    /// Work (or stake) contributed by `header`.
    fn block_proof(&self, header: &BlockHeader) -> U256;

    /// Whether `header` satisfies `target`.
    fn meets_target(&self, header: &BlockHeader, target: &U256) -> bool;
}

/// Pluggable rules enforced once a deployment is active.
pub trait DeploymentRules: Send + Sync {
    /// Check `header` against the deployments `active` for it.
    fn check(&self, header: &BlockHeader, active: &[&str]) -> Result<(), String>;
}

/// Time source for timestamp validation
pub trait TimeSource: Send + Sync {
    /// Get current unix timestamp in seconds
    fn now(&self) -> u64;
}

/// Default time source using system time
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}
