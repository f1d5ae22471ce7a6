//! Network parameters and engine configuration
//!
//! [`NetworkParams`] are protocol constants every node on a network shares.
//! [`ConsensusConfig`] adds local policy on top.

use super::deployment::{DeploymentDefinition, DeploymentSchedule};
use super::pow::{compact_to_target, RetargetParams};
use serde::{Deserialize, Serialize};
use shared_types::{BlockHeader, Hash, U256};
use std::collections::BTreeMap;

/// Headers whose median timestamp bounds the next header from below.
pub const DEFAULT_MEDIAN_TIME_SPAN: usize = 11;
/// How far a header may run ahead of local time (seconds).
pub const DEFAULT_MAX_FUTURE_DRIFT_SECS: u64 = 2 * 60 * 60;
/// Deepest reorganization the node performs on its own.
pub const DEFAULT_MAX_REORG_DEPTH: u64 = 500;

const MAIN_POW_LIMIT_BITS: u32 = 0x1d00_ffff;
const REGTEST_POW_LIMIT_BITS: u32 = 0x207f_ffff;

/// Protocol constants of one network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParams {
    pub name: String,
    pub genesis: BlockHeader,
    pub deployments: Vec<DeploymentDefinition>,
    /// Height -> required header hash.
    pub checkpoints: BTreeMap<u64, Hash>,
    pub retarget: RetargetParams,
    pub median_time_span: usize,
}

impl NetworkParams {
    /// Production-style network: two-week retarget, 95% activation threshold.
    pub fn main(genesis: BlockHeader) -> Self {
        let window = 2016;
        let threshold = 1916;
        Self {
            name: "main".to_string(),
            genesis,
            deployments: vec![
                DeploymentDefinition::new(
                    "csv",
                    0,
                    window,
                    threshold,
                    DeploymentSchedule::MedianTime {
                        start: 1_462_060_800,
                        timeout: 1_493_596_800,
                    },
                ),
                DeploymentDefinition::new(
                    "segwit",
                    1,
                    window,
                    threshold,
                    DeploymentSchedule::MedianTime {
                        start: 1_479_168_000,
                        timeout: 1_510_704_000,
                    },
                ),
            ],
            checkpoints: BTreeMap::new(),
            retarget: RetargetParams {
                pow_limit: pow_limit(MAIN_POW_LIMIT_BITS),
                target_timespan_secs: 14 * 24 * 60 * 60,
                target_spacing_secs: 10 * 60,
                no_retargeting: false,
            },
            median_time_span: DEFAULT_MEDIAN_TIME_SPAN,
        }
    }

    /// Local test network: short windows, 75% threshold, flat difficulty.
    pub fn regtest(genesis: BlockHeader) -> Self {
        let window = 144;
        let threshold = 108;
        let always = DeploymentSchedule::MedianTime {
            start: 0,
            timeout: u64::MAX,
        };
        Self {
            name: "regtest".to_string(),
            genesis,
            deployments: vec![
                DeploymentDefinition::new("csv", 0, window, threshold, always),
                DeploymentDefinition::new("segwit", 1, window, threshold, always),
                DeploymentDefinition::new("testdummy", 28, window, threshold, always),
            ],
            checkpoints: BTreeMap::new(),
            retarget: RetargetParams {
                pow_limit: pow_limit(REGTEST_POW_LIMIT_BITS),
                target_timespan_secs: 14 * 24 * 60 * 60,
                target_spacing_secs: 10 * 60,
                no_retargeting: true,
            },
            median_time_span: DEFAULT_MEDIAN_TIME_SPAN,
        }
    }

    /// Default main-network genesis header.
    pub fn main_genesis() -> BlockHeader {
        BlockHeader {
            version: 1,
            parent_hash: [0u8; 32],
            merkle_root: [0u8; 32],
            timestamp: 1_231_006_505,
            bits: MAIN_POW_LIMIT_BITS,
            nonce: 2_083_236_893,
        }
    }

    /// Default regtest genesis header.
    pub fn regtest_genesis() -> BlockHeader {
        BlockHeader {
            version: 1,
            parent_hash: [0u8; 32],
            merkle_root: [0u8; 32],
            timestamp: 1_296_688_602,
            bits: REGTEST_POW_LIMIT_BITS,
            nonce: 2,
        }
    }

    pub fn genesis_hash(&self) -> Hash {
        self.genesis.hash()
    }

    /// Required hash at `height`, if checkpointed.
    pub fn checkpoint_at(&self, height: u64) -> Option<&Hash> {
        self.checkpoints.get(&height)
    }

    pub fn last_checkpoint_height(&self) -> Option<u64> {
        self.checkpoints.keys().next_back().copied()
    }
}

fn pow_limit(bits: u32) -> U256 {
    compact_to_target(bits).unwrap_or(U256::MAX)
}

/// Consensus engine configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    pub network: NetworkParams,
    /// Deepest reorganization performed automatically.
    pub max_reorg_depth: u64,
    /// Maximum timestamp drift into the future (seconds).
    pub max_future_drift_secs: u64,
}

impl ConsensusConfig {
    pub fn new(network: NetworkParams) -> Self {
        Self {
            network,
            max_reorg_depth: DEFAULT_MAX_REORG_DEPTH,
            max_future_drift_secs: DEFAULT_MAX_FUTURE_DRIFT_SECS,
        }
    }

    pub fn main() -> Self {
        Self::new(NetworkParams::main(NetworkParams::main_genesis()))
    }

    pub fn regtest() -> Self {
        Self::new(NetworkParams::regtest(NetworkParams::regtest_genesis()))
    }

    pub fn with_max_reorg_depth(mut self, depth: u64) -> Self {
        self.max_reorg_depth = depth;
        self
    }

    pub fn with_max_future_drift(mut self, secs: u64) -> Self {
        self.max_future_drift_secs = secs;
        self
    }

    pub fn with_checkpoint(mut self, height: u64, hash: Hash) -> Self {
        self.network.checkpoints.insert(height, hash);
        self
    }

    pub fn with_deployments(mut self, deployments: Vec<DeploymentDefinition>) -> Self {
        self.network.deployments = deployments;
        self
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self::regtest()
    }
}
