//! Driving ports (Inbound API)

use crate::domain::{
    ChainDelta, ChainedHeaderRef, ConsensusError, ConsensusResult, DeploymentStats,
    ThresholdState,
};
use shared_types::{Block, BlockHeader, Hash, PeerId};

/// Result of handing a header or block to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub hash: Hash,
    pub status: SubmitStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitStatus {
    /// Stored. `delta` is set when the active chain moved; `duplicate` when
    /// the header was already known.
    Accepted {
        delta: Option<ChainDelta>,
        duplicate: bool,
    },
    Rejected { error: ConsensusError },
}

impl SubmitOutcome {
    pub fn accepted(hash: Hash, delta: Option<ChainDelta>, duplicate: bool) -> Self {
        Self {
            hash,
            status: SubmitStatus::Accepted { delta, duplicate },
        }
    }

    pub fn rejected(hash: Hash, error: ConsensusError) -> Self {
        Self {
            hash,
            status: SubmitStatus::Rejected { error },
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.status, SubmitStatus::Accepted { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self.status, SubmitStatus::Accepted { duplicate: true, .. })
    }

    pub fn delta(&self) -> Option<&ChainDelta> {
        match &self.status {
            SubmitStatus::Accepted { delta, .. } => delta.as_ref(),
            SubmitStatus::Rejected { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ConsensusError> {
        match &self.status {
            SubmitStatus::Rejected { error } => Some(error),
            SubmitStatus::Accepted { .. } => None,
        }
    }
}

/// Primary Consensus API
///
/// Submissions are serialized internally; queries may run concurrently with
/// them and always observe a committed tip.
pub trait ConsensusApi: Send + Sync {
    /// Validate and store a header announced by `peer`.
    fn submit_header(&self, header: BlockHeader, peer: &PeerId) -> SubmitOutcome;

    /// Validate a block's header, store its body and connect it if it
    /// extends the best chain.
    fn submit_block(&self, block: Block, peer: &PeerId) -> SubmitOutcome;

    /// Current active tip
    fn get_tip(&self) -> ChainedHeaderRef;

    /// State of deployment `id` reported by the active-chain header at
    /// `at_height` (the state governing that header's children).
    fn get_deployment_state(&self, id: &str, at_height: u64) -> ConsensusResult<ThresholdState>;

    fn get_ancestor(&self, hash: &Hash, height: u64) -> ConsensusResult<ChainedHeaderRef>;

    fn get_header(&self, hash: &Hash) -> Option<ChainedHeaderRef>;

    /// Signalling progress of deployment `id` at the active tip.
    fn deployment_statistics(&self, id: &str) -> ConsensusResult<DeploymentStats>;

    /// Whether `hash` was rejected or descends from a rejected header.
    fn is_invalid(&self, hash: &Hash) -> bool;
}
