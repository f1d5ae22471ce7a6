//! # Core Domain Entities
//!
//! Chain entities shared by the consensus engine, the node runtime and the
//! external collaborators (storage, peer management, codecs).
//!
//! ## Clusters
//!
//! - **Chain**: `BlockHeader`, `Block`
//! - **Networking**: `NodeId` / `PeerId`

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// Re-export U256 from primitive-types for use across all crates
pub use primitive_types::U256;

// =============================================================================
// CLUSTER A: THE CHAIN
// =============================================================================

/// A 32-byte hash (double SHA-256 of the serialized header).
pub type Hash = [u8; 32];

/// The all-zero hash, used as the parent of genesis.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Lowercase hex rendering of a hash, for logs and error messages.
pub fn hash_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

/// Abbreviated hex rendering (first 8 bytes).
pub fn short_hash(hash: &Hash) -> String {
    hex::encode(&hash[..8])
}

/// The protocol header of a block.
///
/// Parsing from wire bytes is the codec's job; the engine only ever sees
/// this already-decoded form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockHeader {
    /// Version field. The top three bits `001` mark version-bits signalling;
    /// the low 29 bits carry one ratification flag per deployment.
    pub version: u32,
    /// Hash of the parent header (zero for genesis).
    pub parent_hash: Hash,
    /// Merkle commitment to the block's transactions.
    pub merkle_root: Hash,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Compact encoding of the proof target.
    pub bits: u32,
    /// Proof nonce.
    pub nonce: u64,
}

impl BlockHeader {
    /// Compute the identifying hash of this header.
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.version.to_le_bytes());
        hasher.update(self.parent_hash);
        hasher.update(self.merkle_root);
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.bits.to_le_bytes());
        hasher.update(self.nonce.to_le_bytes());
        let first = hasher.finalize();
        Sha256::digest(first).into()
    }

    /// Check if this header claims to be a genesis header.
    pub fn is_genesis(&self) -> bool {
        self.parent_hash == ZERO_HASH
    }
}

/// A full block: header plus opaque transaction payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Block {
    /// The block header.
    pub header: BlockHeader,
    /// Encoded transactions. Their semantics belong to the storage engine.
    pub transactions: Vec<Vec<u8>>,
}

impl Block {
    /// Get the hash of this block.
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }
}

// =============================================================================
// CLUSTER B: NETWORKING
// =============================================================================

/// Unique identifier for a node in the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct NodeId(pub [u8; 32]);

/// A peer identifier (alias for `NodeId` in peer contexts).
pub type PeerId = NodeId;

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}
