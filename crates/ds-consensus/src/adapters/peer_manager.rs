//! Recording peer manager.
//!
//! Keeps every chain delta and penalty it is told about. Used by the node
//! runtime until a connection manager is attached, and by tests.

use crate::domain::{ChainDelta, ConsensusErrorKind};
use crate::ports::PeerManager;
use parking_lot::RwLock;
use shared_types::PeerId;

#[derive(Default)]
pub struct InMemoryPeerManager {
    deltas: RwLock<Vec<ChainDelta>>,
    penalties: RwLock<Vec<(PeerId, ConsensusErrorKind)>>,
}

impl InMemoryPeerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deltas(&self) -> Vec<ChainDelta> {
        self.deltas.read().clone()
    }

    pub fn penalties(&self) -> Vec<(PeerId, ConsensusErrorKind)> {
        self.penalties.read().clone()
    }

    /// Number of penalties recorded against `peer`.
    pub fn penalty_count(&self, peer: &PeerId) -> usize {
        self.penalties
            .read()
            .iter()
            .filter(|(p, _)| p == peer)
            .count()
    }

    pub fn clear(&self) {
        self.deltas.write().clear();
        self.penalties.write().clear();
    }
}

impl PeerManager for InMemoryPeerManager {
    fn on_chain_delta(&self, delta: &ChainDelta) {
        self.deltas.write().push(delta.clone());
    }

    fn penalize(&self, peer: &PeerId, kind: ConsensusErrorKind) {
        tracing::debug!(peer = %peer, kind = kind.as_str(), "Peer penalized");
        self.penalties.write().push((peer.clone(), kind));
    }
}
