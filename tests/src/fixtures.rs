//! Shared fixtures: engines wired to in-memory collaborators and factories
//! for chains of headers.

use ds_consensus::adapters::{
    HashTargetVerifier, InMemoryKVStore, InMemoryPeerManager, KvChainStorage, NoDeploymentRules,
};
use ds_consensus::domain::{compact_to_target, VERSIONBITS_TOP_BITS};
use ds_consensus::ports::ProofVerifier;
use ds_consensus::{ChainStorage, ConsensusApi, ConsensusConfig, ConsensusDependencies, ConsensusEngine, SubmitOutcome};
use shared_types::{Block, BlockHeader, NodeId, PeerId, U256};
use std::sync::Arc;

/// Plain version-bits header version with no flags set.
pub const BASE_VERSION: u32 = VERSIONBITS_TOP_BITS;

pub type KvStorage = KvChainStorage<InMemoryKVStore>;
pub type TestEngine<S = KvStorage> = ConsensusEngine<S, InMemoryPeerManager>;

/// Every header contributes one unit of work and meets any target, so
/// cumulative work equals height + 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitWork;

impl ProofVerifier for UnitWork {
    fn block_proof(&self, _header: &BlockHeader) -> U256 {
        U256::one()
    }

    fn meets_target(&self, _header: &BlockHeader, _target: &U256) -> bool {
        true
    }
}

pub fn peer(n: u8) -> PeerId {
    NodeId([n; 32])
}

/// Fresh key-value backed storage positioned at the genesis of `config`.
pub fn kv_storage(config: &ConsensusConfig) -> KvStorage {
    KvChainStorage::new(InMemoryKVStore::new(), config.network.genesis_hash())
        .expect("in-memory storage opens")
}

pub fn engine_with<S: ChainStorage>(
    config: ConsensusConfig,
    storage: S,
    proof: Arc<dyn ProofVerifier>,
) -> TestEngine<S> {
    ConsensusEngine::new(ConsensusDependencies {
        storage: Arc::new(storage),
        peers: Arc::new(InMemoryPeerManager::new()),
        proof,
        rules: Arc::new(NoDeploymentRules),
        config,
    })
}

/// Regtest engine where work equals height + 1.
pub fn unit_work_engine(config: ConsensusConfig) -> TestEngine {
    let storage = kv_storage(&config);
    engine_with(config, storage, Arc::new(UnitWork))
}

/// Regtest engine checking real proof of work.
pub fn pow_engine(config: ConsensusConfig) -> TestEngine {
    let storage = kv_storage(&config);
    engine_with(config, storage, Arc::new(HashTargetVerifier))
}

/// Unmined child of `parent`. `salt` separates competing branches.
pub fn child(parent: &BlockHeader, version: u32, salt: u64) -> Block {
    let mut merkle_root = [0u8; 32];
    merkle_root[..8].copy_from_slice(&salt.to_le_bytes());
    Block {
        header: BlockHeader {
            version,
            parent_hash: parent.hash(),
            merkle_root,
            timestamp: parent.timestamp + 600,
            bits: parent.bits,
            nonce: 0,
        },
        transactions: vec![salt.to_le_bytes().to_vec()],
    }
}

/// Grind the nonce until the header meets its own compact target.
pub fn mine(header: &mut BlockHeader) {
    let target = compact_to_target(header.bits).expect("valid compact target");
    while !HashTargetVerifier.meets_target(header, &target) {
        header.nonce += 1;
    }
}

/// `len` children stacked on `parent`, with per-height versions from
/// `version_at(index)`.
pub fn branch_with<F>(parent: &BlockHeader, len: usize, salt: u64, mined: bool, version_at: F) -> Vec<Block>
where
    F: Fn(usize) -> u32,
{
    let mut blocks: Vec<Block> = Vec::with_capacity(len);
    let mut tip = *parent;
    for index in 0..len {
        let mut block = child(&tip, version_at(index), salt);
        if mined {
            mine(&mut block.header);
        }
        tip = block.header;
        blocks.push(block);
    }
    blocks
}

/// `len` unmined, non-signalling children stacked on `parent`.
pub fn branch(parent: &BlockHeader, len: usize, salt: u64) -> Vec<Block> {
    branch_with(parent, len, salt, false, |_| BASE_VERSION)
}

/// Submit blocks in order, asserting each one is accepted.
pub fn submit_all<A: ConsensusApi>(engine: &A, blocks: &[Block], from: &PeerId) -> Vec<SubmitOutcome> {
    blocks
        .iter()
        .map(|block| {
            let outcome = engine.submit_block(block.clone(), from);
            assert!(outcome.is_accepted(), "block rejected: {:?}", outcome.error());
            outcome
        })
        .collect()
}

/// Announce `blocks` by header, then deliver bodies highest first. The
/// branch only becomes a candidate when its lowest body arrives, so no
/// intermediate tie can move the tip. Returns the outcome of that last body.
pub fn deliver_reversed<A: ConsensusApi>(engine: &A, blocks: &[Block], from: &PeerId) -> SubmitOutcome {
    for block in blocks {
        let outcome = engine.submit_header(block.header, from);
        assert!(outcome.is_accepted(), "header rejected: {:?}", outcome.error());
    }
    let mut last = None;
    for block in blocks.iter().rev() {
        last = Some(engine.submit_block(block.clone(), from));
    }
    last.expect("non-empty branch")
}

pub fn hashes(blocks: &[Block]) -> Vec<shared_types::Hash> {
    blocks.iter().map(Block::hash).collect()
}
