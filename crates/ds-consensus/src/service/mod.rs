//! Consensus Engine - orchestration of one submission
//!
//! # Lifecycle
//! ```text
//! Received → Validated → Inserted → TipUnchanged
//!                                 → ReorgAttempted → ReorgSucceeded
//!                                                  → ReorgFailed → RolledBack
//! ```
//! ending in `Accepted` or `Rejected`.
//!
//! # Rejection policy
//! - orphans are not remembered; the header may become valid once its
//!   ancestors arrive
//! - every other validation failure marks the header invalid so that
//!   re-announcements fail fast; fatal kinds take the branch with them
//! - a block that fails to connect is marked invalid and storage returns
//!   to the old tip
//! - reorg failures penalize the peer that delivered the offending body,
//!   not the peer whose submission triggered the switch

use crate::domain::{
    BestChainSelector, ChainDelta, ChainedHeaderRef, ChainedHeaderTree, ConsensusConfig,
    ConsensusError, ConsensusErrorKind, ConsensusResult, DeploymentStats, DeploymentTracker,
    ReorgExecutor, Severity, ThresholdState,
};
use crate::metrics;
use crate::ports::{
    ChainStorage, ConsensusApi, DeploymentRules, PeerManager, ProofVerifier, SubmitOutcome,
    SystemTimeSource, TimeSource,
};
use crate::state::ConsensusState;
use crate::validation::HeaderValidator;
use shared_types::{short_hash, Block, BlockHeader, Hash, PeerId};
use std::sync::Arc;

/// Consensus Engine
pub struct ConsensusEngine<S, P>
where
    S: ChainStorage,
    P: PeerManager,
{
    storage: Arc<S>,
    peers: Arc<P>,
    state: Arc<ConsensusState>,
    validator: HeaderValidator,
    tracker: DeploymentTracker,
    reorg: ReorgExecutor,
    time_source: Box<dyn TimeSource>,
}

/// Dependencies for ConsensusEngine
pub struct ConsensusDependencies<S, P> {
    pub storage: Arc<S>,
    pub peers: Arc<P>,
    pub proof: Arc<dyn ProofVerifier>,
    pub rules: Arc<dyn DeploymentRules>,
    pub config: ConsensusConfig,
}

/// Whether a failed header should be remembered as invalid.
fn marks_invalid(error: &ConsensusError) -> bool {
    match error {
        // may become acceptable as local time advances
        ConsensusError::TimestampOutOfRange {
            timestamp,
            max_allowed,
            ..
        } => timestamp <= max_allowed,
        other => matches!(other.severity(), Severity::Invalid | Severity::Fatal),
    }
}

impl<S, P> ConsensusEngine<S, P>
where
    S: ChainStorage,
    P: PeerManager,
{
    /// Create an engine positioned at the genesis of `deps.config`.
    ///
    /// Storage is assumed to be at genesis as well.
    pub fn new(deps: ConsensusDependencies<S, P>) -> Self {
        let network = &deps.config.network;
        let tracker = DeploymentTracker::new(network.deployments.clone(), network.median_time_span);
        let tree = ChainedHeaderTree::new(
            network.genesis,
            deps.proof.block_proof(&network.genesis),
            tracker.genesis_states(),
        );
        tracing::info!(
            network = %network.name,
            genesis = %short_hash(&tree.genesis().hash()),
            deployments = tracker.deployments().len(),
            checkpoints = network.checkpoints.len(),
            "Consensus engine initialized"
        );

        let reorg = ReorgExecutor::new(deps.config.max_reorg_depth);
        Self {
            storage: deps.storage,
            peers: deps.peers,
            state: Arc::new(ConsensusState::new(tree)),
            validator: HeaderValidator::new(deps.config, deps.proof, deps.rules),
            tracker,
            reorg,
            time_source: Box::new(SystemTimeSource),
        }
    }

    /// Set custom time source (for testing)
    pub fn with_time_source(mut self, time_source: Box<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    pub fn config(&self) -> &ConsensusConfig {
        self.validator.config()
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn peers(&self) -> &Arc<P> {
        &self.peers
    }

    /// Validate and link `header`. Returns `(header, duplicate)`.
    fn accept_header(
        &self,
        tree: &mut ChainedHeaderTree,
        header: &BlockHeader,
        peer: &PeerId,
    ) -> ConsensusResult<(ChainedHeaderRef, bool)> {
        let hash = header.hash();
        if let Some(existing) = tree.get(&hash) {
            if let Some(mark) = tree.invalid_mark(&hash) {
                return Err(ConsensusError::InvalidAncestor {
                    hash,
                    ancestor: mark.origin,
                    ancestor_kind: mark.kind,
                });
            }
            tracing::trace!(hash = %short_hash(&hash), "Duplicate header");
            return Ok((existing, true));
        }

        let started = std::time::Instant::now();
        let validated = self
            .validator
            .validate(header, tree, &self.tracker, self.time_source.now())?;
        metrics::record_validation_latency(started.elapsed().as_secs_f64());
        tracing::debug!(
            hash = %short_hash(&hash),
            height = validated.parent.height() + 1,
            peer = %peer,
            "Header validated"
        );

        let states = self
            .tracker
            .states_for_child(tree, &validated.parent, header)?;
        let inserted = tree.insert(*header, states, validated.proof)?;
        metrics::record_header_accepted();
        tracing::debug!(
            hash = %short_hash(&hash),
            height = inserted.height(),
            "Header inserted"
        );
        Ok((inserted, false))
    }

    /// Move the active chain to the best candidate, if it changed.
    fn update_tip(&self, tree: &mut ChainedHeaderTree) -> ConsensusResult<Option<ChainDelta>> {
        let old = self.state.tip();
        let best = BestChainSelector::select_best(tree);
        if best.hash() == old.hash() {
            tracing::trace!(tip = %short_hash(&old.hash()), "Tip unchanged");
            return Ok(None);
        }

        match self
            .reorg
            .reorganize(tree, &old.hash(), &best.hash(), self.storage.as_ref())
        {
            Ok(delta) => {
                tree.set_active_tip(&best.hash())?;
                self.state.publish_tip(best.clone());

                if !delta.is_extension() {
                    metrics::record_reorg(delta.depth());
                }
                metrics::set_tip_height(best.height());
                tracing::info!(
                    height = best.height(),
                    hash = %short_hash(&best.hash()),
                    disconnected = delta.disconnected.len(),
                    connected = delta.connected.len(),
                    "Chain tip updated"
                );
                self.peers.on_chain_delta(&delta);
                Ok(Some(delta))
            }
            Err(e @ ConsensusError::MaxReorgViolation { .. }) => {
                // The whole branch above the fork is refused.
                let fork = tree.find_fork(&old.hash(), &best.hash())?;
                let first = tree.get_ancestor(&best.hash(), fork.height() + 1)?;
                tree.mark_invalid(&first.hash(), ConsensusErrorKind::MaxReorgViolation);
                self.penalize_source(tree, &best.hash(), ConsensusErrorKind::MaxReorgViolation);
                tracing::warn!(
                    tip = %short_hash(&old.hash()),
                    candidate = %short_hash(&best.hash()),
                    error = %e,
                    "Reorganization refused"
                );
                Err(e)
            }
            Err(e) => {
                if let ConsensusError::ConnectBlockFailed { hash, .. } = &e {
                    tree.mark_invalid(hash, ConsensusErrorKind::ConnectBlockFailed);
                    self.penalize_source(tree, hash, ConsensusErrorKind::ConnectBlockFailed);
                }
                tracing::warn!(tip = %short_hash(&old.hash()), error = %e, "Reorganization rolled back");
                Err(e)
            }
        }
    }

    /// Penalize whoever delivered the body of `hash`.
    fn penalize_source(&self, tree: &ChainedHeaderTree, hash: &Hash, kind: ConsensusErrorKind) {
        match tree.block_source(hash) {
            Some(source) => self.peers.penalize(source, kind),
            None => tracing::debug!(hash = %short_hash(hash), "No block source to penalize"),
        }
    }

    fn reject(
        &self,
        tree: &mut ChainedHeaderTree,
        hash: Hash,
        peer: &PeerId,
        error: ConsensusError,
    ) -> SubmitOutcome {
        let kind = error.kind();
        // reorg failures were already marked and charged to the branch that caused them
        let from_reorg = matches!(
            kind,
            ConsensusErrorKind::MaxReorgViolation | ConsensusErrorKind::ConnectBlockFailed
        );
        if marks_invalid(&error) && !from_reorg {
            tree.mark_invalid(&hash, kind);
        }
        if kind.penalizes_peer() && !from_reorg {
            self.peers.penalize(peer, kind);
        }
        metrics::record_header_rejected(kind.as_str());

        match kind.severity() {
            Severity::Recoverable => {
                tracing::debug!(hash = %short_hash(&hash), peer = %peer, error = %error, "Submission deferred")
            }
            Severity::Local => {
                tracing::error!(hash = %short_hash(&hash), error = %error, "Submission failed locally")
            }
            Severity::Invalid | Severity::Fatal => {
                tracing::warn!(hash = %short_hash(&hash), peer = %peer, error = %error, "Submission rejected")
            }
        }
        SubmitOutcome::rejected(hash, error)
    }

    fn process(&self, header: &BlockHeader, block: Option<&Block>, peer: &PeerId) -> SubmitOutcome {
        let _writer = self.state.writer();
        let mut tree = self.state.chain.write();
        let hash = header.hash();

        let (_, duplicate) = match self.accept_header(&mut tree, header, peer) {
            Ok(accepted) => accepted,
            Err(e) => return self.reject(&mut tree, hash, peer, e),
        };

        if let Some(block) = block {
            if !tree.has_block_data(&hash) {
                if let Err(e) = self.storage.store_block(block) {
                    return self.reject(&mut tree, hash, peer, e.into());
                }
                if let Err(e) = tree.set_block_data(&hash) {
                    return self.reject(&mut tree, hash, peer, e);
                }
                tree.set_block_source(&hash, peer);
            }
        }

        match self.update_tip(&mut tree) {
            Ok(delta) => SubmitOutcome::accepted(hash, delta, duplicate),
            Err(e) => self.reject(&mut tree, hash, peer, e),
        }
    }
}

impl<S, P> ConsensusApi for ConsensusEngine<S, P>
where
    S: ChainStorage + 'static,
    P: PeerManager + 'static,
{
    fn submit_header(&self, header: BlockHeader, peer: &PeerId) -> SubmitOutcome {
        self.process(&header, None, peer)
    }

    fn submit_block(&self, block: Block, peer: &PeerId) -> SubmitOutcome {
        self.process(&block.header, Some(&block), peer)
    }

    fn get_tip(&self) -> ChainedHeaderRef {
        self.state.tip()
    }

    fn get_deployment_state(&self, id: &str, at_height: u64) -> ConsensusResult<ThresholdState> {
        let tip = self.state.tip();
        let tree = self.state.chain.read();
        let header = tree.get_ancestor(&tip.hash(), at_height)?;
        self.tracker.get_state(id, &header)
    }

    fn get_ancestor(&self, hash: &Hash, height: u64) -> ConsensusResult<ChainedHeaderRef> {
        self.state.chain.read().get_ancestor(hash, height)
    }

    fn get_header(&self, hash: &Hash) -> Option<ChainedHeaderRef> {
        self.state.chain.read().get(hash)
    }

    fn deployment_statistics(&self, id: &str) -> ConsensusResult<DeploymentStats> {
        let tip = self.state.tip();
        let tree = self.state.chain.read();
        self.tracker.statistics(&tree, id, &tip)
    }

    fn is_invalid(&self, hash: &Hash) -> bool {
        self.state.chain.read().is_invalid(hash)
    }
}
