use crate::domain::{
    calculate_next_target, compact_to_target, ChainedHeaderRef, ChainedHeaderTree,
    ConsensusConfig, ConsensusError, ConsensusResult, DeploymentTracker,
};
use crate::ports::{DeploymentRules, ProofVerifier};
use shared_types::{BlockHeader, U256};
use std::sync::Arc;

/// A header that passed every check, ready to be linked into the tree.
#[derive(Debug, Clone)]
pub struct ValidatedHeader {
    pub header: BlockHeader,
    pub parent: ChainedHeaderRef,
    /// Work contributed by the header.
    pub proof: U256,
}

/// Header validation against the current tree.
///
/// Checks run in a fixed order and stop at the first failure. The verdict
/// depends only on the header, the tree and `now`.
pub struct HeaderValidator {
    config: ConsensusConfig,
    proof: Arc<dyn ProofVerifier>,
    rules: Arc<dyn DeploymentRules>,
}

impl HeaderValidator {
    pub fn new(
        config: ConsensusConfig,
        proof: Arc<dyn ProofVerifier>,
        rules: Arc<dyn DeploymentRules>,
    ) -> Self {
        Self {
            config,
            proof,
            rules,
        }
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn proof_verifier(&self) -> &dyn ProofVerifier {
        self.proof.as_ref()
    }

    pub fn validate(
        &self,
        header: &BlockHeader,
        tree: &ChainedHeaderTree,
        tracker: &DeploymentTracker,
        now: u64,
    ) -> ConsensusResult<ValidatedHeader> {
        let parent = Self::validate_parent(header, tree)?;
        self.validate_timestamp(header, &parent, tree, now)?;
        let proof = self.validate_proof(header, &parent, tree)?;
        self.validate_checkpoint(header, &parent)?;
        self.validate_deployment_rules(header, &parent, tracker)?;
        Ok(ValidatedHeader {
            header: *header,
            parent,
            proof,
        })
    }

    /// The parent must be known and on a branch that was never rejected.
    pub fn validate_parent(
        header: &BlockHeader,
        tree: &ChainedHeaderTree,
    ) -> ConsensusResult<ChainedHeaderRef> {
        let hash = header.hash();
        let mark = tree
            .invalid_mark(&hash)
            .or_else(|| tree.invalid_mark(&header.parent_hash));
        if let Some(mark) = mark {
            return Err(ConsensusError::InvalidAncestor {
                hash,
                ancestor: mark.origin,
                ancestor_kind: mark.kind,
            });
        }

        tree.get(&header.parent_hash)
            .ok_or(ConsensusError::OrphanHeader {
                hash,
                parent: header.parent_hash,
            })
    }

    /// Timestamp must exceed the median of recent ancestors and not run too
    /// far ahead of local time.
    pub fn validate_timestamp(
        &self,
        header: &BlockHeader,
        parent: &ChainedHeaderRef,
        tree: &ChainedHeaderTree,
        now: u64,
    ) -> ConsensusResult<()> {
        let median_time_past =
            tree.median_time_past(&parent.hash(), self.config.network.median_time_span)?;
        let max_allowed = now.saturating_add(self.config.max_future_drift_secs);

        if header.timestamp <= median_time_past || header.timestamp > max_allowed {
            return Err(ConsensusError::TimestampOutOfRange {
                timestamp: header.timestamp,
                median_time_past,
                max_allowed,
            });
        }
        Ok(())
    }

    /// `bits` must match the retarget schedule and the header must meet it.
    pub fn validate_proof(
        &self,
        header: &BlockHeader,
        parent: &ChainedHeaderRef,
        tree: &ChainedHeaderTree,
    ) -> ConsensusResult<U256> {
        let height = parent.height() + 1;
        let expected = self.expected_bits(parent, tree)?;
        if header.bits != expected {
            return Err(ConsensusError::InsufficientProof {
                height,
                reason: format!("bits {:#010x}, expected {:#010x}", header.bits, expected),
            });
        }

        let target = compact_to_target(header.bits)
            .filter(|t| !t.is_zero() && *t <= self.config.network.retarget.pow_limit)
            .ok_or_else(|| ConsensusError::InsufficientProof {
                height,
                reason: format!("target {:#010x} out of range", header.bits),
            })?;

        if !self.proof.meets_target(header, &target) {
            return Err(ConsensusError::InsufficientProof {
                height,
                reason: "proof does not meet target".to_string(),
            });
        }
        Ok(self.proof.block_proof(header))
    }

    /// Compact target required for the child of `parent`.
    pub fn expected_bits(
        &self,
        parent: &ChainedHeaderRef,
        tree: &ChainedHeaderTree,
    ) -> ConsensusResult<u32> {
        let retarget = &self.config.network.retarget;
        let height = parent.height() + 1;
        if !retarget.is_retarget_height(height) {
            return Ok(parent.header().bits);
        }

        let first = tree.get_ancestor(&parent.hash(), height - retarget.interval())?;
        let actual = parent.timestamp().saturating_sub(first.timestamp());
        Ok(calculate_next_target(parent.header().bits, actual, retarget))
    }

    pub fn validate_checkpoint(
        &self,
        header: &BlockHeader,
        parent: &ChainedHeaderRef,
    ) -> ConsensusResult<()> {
        let height = parent.height() + 1;
        if let Some(expected) = self.config.network.checkpoint_at(height) {
            let actual = header.hash();
            if actual != *expected {
                return Err(ConsensusError::CheckpointMismatch {
                    height,
                    expected: *expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    pub fn validate_deployment_rules(
        &self,
        header: &BlockHeader,
        parent: &ChainedHeaderRef,
        tracker: &DeploymentTracker,
    ) -> ConsensusResult<()> {
        let active = tracker.active_for_child(parent);
        self.rules
            .check(header, &active)
            .map_err(|reason| ConsensusError::DeploymentRuleViolation {
                hash: header.hash(),
                reason,
            })
    }
}
