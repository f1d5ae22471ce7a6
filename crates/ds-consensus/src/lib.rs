//! # ds-consensus
//!
//! Consensus validation and chain management for the DeStream node.
//!
//! ## Architecture
//!
//! ```text
//!   submit_header / submit_block
//!              │
//!              ▼
//!   ┌─────────────────────┐     ┌──────────────────────┐
//!   │   HeaderValidator   │────▶│ ChainedHeaderTree    │
//!   └─────────────────────┘     │  + DeploymentTracker │
//!                               └──────────┬───────────┘
//!                                          ▼
//!                               ┌──────────────────────┐
//!                               │  BestChainSelector   │
//!                               └──────────┬───────────┘
//!                                          ▼
//!                               ┌──────────────────────┐     ChainStorage
//!                               │   ReorgExecutor      │────▶ PeerManager
//!                               └──────────────────────┘
//! ```
//!
//! All mutations go through one writer; readers see the published tip and
//! never a half-applied reorganization.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ds_consensus::{ConsensusApi, ConsensusConfig, ConsensusDependencies, ConsensusEngine};
//!
//! let engine = ConsensusEngine::new(ConsensusDependencies {
//!     storage,
//!     peers,
//!     proof: Arc::new(HashTargetVerifier),
//!     rules: Arc::new(NoDeploymentRules),
//!     config: ConsensusConfig::regtest(),
//! });
//!
//! let outcome = engine.submit_block(block, &peer);
//! ```

pub mod adapters;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod state;
pub mod validation;

// Re-export main types
pub use domain::{
    BestChainSelector, ChainDelta, ChainedHeader, ChainedHeaderRef, ChainedHeaderTree,
    ConsensusConfig, ConsensusError, ConsensusErrorKind, ConsensusResult, DeploymentDefinition,
    DeploymentSchedule, DeploymentStats, DeploymentTracker, NetworkParams, ReorgExecutor,
    Severity, ThresholdState,
};
pub use ports::{
    ChainStorage, ConsensusApi, DeploymentRules, PeerManager, ProofVerifier, SubmitOutcome,
    SubmitStatus, TimeSource,
};
pub use service::{ConsensusDependencies, ConsensusEngine};
pub use validation::{HeaderValidator, ValidatedHeader};
