//! Error types for the consensus engine
//!
//! Every operation returns a closed [`ConsensusError`]; nothing unwinds across
//! component boundaries. Connection management consumes the
//! [`ConsensusErrorKind`] / [`Severity`] pair to decide on peer penalties.

use serde::{Deserialize, Serialize};
use shared_types::{short_hash, Hash, StorageError};

/// Consensus error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsensusError {
    #[error("Orphan header {}: parent {} unknown", short_hash(.hash), short_hash(.parent))]
    OrphanHeader { hash: Hash, parent: Hash },

    #[error("Header {} descends from rejected header {}", short_hash(.hash), short_hash(.ancestor))]
    InvalidAncestor {
        hash: Hash,
        ancestor: Hash,
        ancestor_kind: ConsensusErrorKind,
    },

    #[error("Timestamp {timestamp} out of range: must exceed median {median_time_past} and not exceed {max_allowed}")]
    TimestampOutOfRange {
        timestamp: u64,
        median_time_past: u64,
        max_allowed: u64,
    },

    #[error("Insufficient proof at height {height}: {reason}")]
    InsufficientProof { height: u64, reason: String },

    #[error("Checkpoint mismatch at height {height}: expected {}, got {}", short_hash(.expected), short_hash(.actual))]
    CheckpointMismatch {
        height: u64,
        expected: Hash,
        actual: Hash,
    },

    #[error("Header {} violates active deployment rules: {reason}", short_hash(.hash))]
    DeploymentRuleViolation { hash: Hash, reason: String },

    #[error("Reorg depth {depth} exceeds maximum {max_depth}")]
    MaxReorgViolation { depth: u64, max_depth: u64 },

    #[error("Failed to connect block {} at height {height}: {source}", short_hash(.hash))]
    ConnectBlockFailed {
        hash: Hash,
        height: u64,
        source: StorageError,
    },

    #[error("Height {height} not found below header {} (height {header_height})", short_hash(.hash))]
    HeightNotFound {
        hash: Hash,
        height: u64,
        header_height: u64,
    },

    #[error("Unknown header {}", short_hash(.0))]
    UnknownHeader(Hash),

    #[error("Unknown deployment: {0}")]
    UnknownDeployment(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// The closed set of failure kinds, independent of payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsensusErrorKind {
    OrphanHeader,
    InvalidAncestor,
    TimestampOutOfRange,
    InsufficientProof,
    CheckpointMismatch,
    DeploymentRuleViolation,
    MaxReorgViolation,
    ConnectBlockFailed,
    HeightNotFound,
    UnknownHeader,
    UnknownDeployment,
    Storage,
}

/// How a failure should be treated outside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Retry once the missing data arrives; the peer did nothing wrong.
    Recoverable,
    /// The data broke a protocol rule; the originating peer is penalized.
    Invalid,
    /// The branch is rejected permanently and the peer is penalized.
    Fatal,
    /// A local query or collaborator failure; no peer is at fault.
    Local,
}

impl ConsensusErrorKind {
    pub fn severity(self) -> Severity {
        match self {
            Self::OrphanHeader => Severity::Recoverable,
            Self::TimestampOutOfRange
            | Self::InsufficientProof
            | Self::DeploymentRuleViolation
            | Self::ConnectBlockFailed => Severity::Invalid,
            Self::InvalidAncestor | Self::CheckpointMismatch | Self::MaxReorgViolation => {
                Severity::Fatal
            }
            Self::HeightNotFound | Self::UnknownHeader | Self::UnknownDeployment | Self::Storage => {
                Severity::Local
            }
        }
    }

    /// Whether the peer that supplied the data should be penalized.
    pub fn penalizes_peer(self) -> bool {
        matches!(self.severity(), Severity::Invalid | Severity::Fatal)
    }

    /// Metric/log label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OrphanHeader => "orphan_header",
            Self::InvalidAncestor => "invalid_ancestor",
            Self::TimestampOutOfRange => "timestamp_out_of_range",
            Self::InsufficientProof => "insufficient_proof",
            Self::CheckpointMismatch => "checkpoint_mismatch",
            Self::DeploymentRuleViolation => "deployment_rule_violation",
            Self::MaxReorgViolation => "max_reorg_violation",
            Self::ConnectBlockFailed => "connect_block_failed",
            Self::HeightNotFound => "height_not_found",
            Self::UnknownHeader => "unknown_header",
            Self::UnknownDeployment => "unknown_deployment",
            Self::Storage => "storage",
        }
    }
}

impl ConsensusError {
    pub fn kind(&self) -> ConsensusErrorKind {
        match self {
            Self::OrphanHeader { .. } => ConsensusErrorKind::OrphanHeader,
            Self::InvalidAncestor { .. } => ConsensusErrorKind::InvalidAncestor,
            Self::TimestampOutOfRange { .. } => ConsensusErrorKind::TimestampOutOfRange,
            Self::InsufficientProof { .. } => ConsensusErrorKind::InsufficientProof,
            Self::CheckpointMismatch { .. } => ConsensusErrorKind::CheckpointMismatch,
            Self::DeploymentRuleViolation { .. } => ConsensusErrorKind::DeploymentRuleViolation,
            Self::MaxReorgViolation { .. } => ConsensusErrorKind::MaxReorgViolation,
            Self::ConnectBlockFailed { .. } => ConsensusErrorKind::ConnectBlockFailed,
            Self::HeightNotFound { .. } => ConsensusErrorKind::HeightNotFound,
            Self::UnknownHeader(_) => ConsensusErrorKind::UnknownHeader,
            Self::UnknownDeployment(_) => ConsensusErrorKind::UnknownDeployment,
            Self::Storage(_) => ConsensusErrorKind::Storage,
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind().severity()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Result type for consensus operations
pub type ConsensusResult<T> = Result<T, ConsensusError>;
