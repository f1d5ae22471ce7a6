//! Proof-of-work verification by hash comparison.

use crate::domain::{compact_to_target, work_for_target};
use crate::ports::ProofVerifier;
use shared_types::{BlockHeader, U256};

/// Treats the header hash as a little-endian 256-bit number that must not
/// exceed the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashTargetVerifier;

impl ProofVerifier for HashTargetVerifier {
    fn block_proof(&self, header: &BlockHeader) -> U256 {
        compact_to_target(header.bits)
            .filter(|target| !target.is_zero())
            .map(work_for_target)
            .unwrap_or_default()
    }

    fn meets_target(&self, header: &BlockHeader, target: &U256) -> bool {
        U256::from_little_endian(&header.hash()) <= *target
    }
}
