use crate::domain::{ChainedHeaderRef, ChainedHeaderTree};
use parking_lot::{Mutex, MutexGuard, RwLock};

/// Encapsulates the mutable state of the consensus engine.
///
/// `writer` serializes every mutation. The tree is write-locked for the
/// whole insert + reorg of one submission, so readers never see a half
/// applied tip switch; `tip` is republished only after a switch commits.
pub struct ConsensusState {
    pub chain: RwLock<ChainedHeaderTree>,
    tip: RwLock<ChainedHeaderRef>,
    writer: Mutex<()>,
}

impl ConsensusState {
    pub fn new(tree: ChainedHeaderTree) -> Self {
        let tip = tree.active_tip();
        Self {
            chain: RwLock::new(tree),
            tip: RwLock::new(tip),
            writer: Mutex::new(()),
        }
    }

    /// Take the single-writer lock.
    pub fn writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock()
    }

    pub fn tip(&self) -> ChainedHeaderRef {
        self.tip.read().clone()
    }

    pub fn publish_tip(&self, tip: ChainedHeaderRef) {
        *self.tip.write() = tip;
    }
}
