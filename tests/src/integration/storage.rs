//! Storage-side guarantees: a failed reorganization leaves storage exactly
//! at the old tip, and readers only ever observe committed tips.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use ds_consensus::{
        ChainStorage, ConsensusApi, ConsensusConfig, ConsensusError, ConsensusErrorKind,
        NetworkParams,
    };
    use parking_lot::Mutex;
    use shared_types::{Block, Hash, StorageError};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Key-value storage whose state engine refuses selected blocks.
    struct RefusingStorage {
        inner: KvStorage,
        refuse: Mutex<HashSet<Hash>>,
    }

    impl ChainStorage for RefusingStorage {
        fn store_block(&self, block: &Block) -> Result<(), StorageError> {
            self.inner.store_block(block)
        }

        fn apply_block(&self, hash: &Hash) -> Result<(), StorageError> {
            if self.refuse.lock().contains(hash) {
                return Err(StorageError::RejectedByState {
                    block_hash: shared_types::hash_hex(hash),
                    reason: "input already spent".into(),
                });
            }
            self.inner.apply_block(hash)
        }

        fn rollback_block(&self, hash: &Hash) -> Result<(), StorageError> {
            self.inner.rollback_block(hash)
        }
    }

    fn refusing_engine() -> TestEngine<RefusingStorage> {
        let config = ConsensusConfig::regtest();
        let storage = RefusingStorage {
            inner: kv_storage(&config),
            refuse: Mutex::new(HashSet::new()),
        };
        engine_with(config, storage, Arc::new(UnitWork))
    }

    #[test]
    fn test_failed_connect_leaves_old_chain_applied() {
        let engine = refusing_engine();
        let genesis = NetworkParams::regtest_genesis();

        let main = branch(&genesis, 5, 1);
        submit_all(&engine, &main, &peer(1));

        let side = branch(&main[1].header, 5, 2);
        engine.storage().refuse.lock().insert(side[2].hash());
        let outcome = deliver_reversed(&engine, &side, &peer(2));

        match outcome.error() {
            Some(ConsensusError::ConnectBlockFailed { hash, height, .. }) => {
                assert_eq!(*hash, side[2].hash());
                assert_eq!(*height, 5);
            }
            other => panic!("expected connect failure, got {other:?}"),
        }

        let inner = &engine.storage().inner;
        let tip = main.last().unwrap().hash();
        assert_eq!(engine.get_tip().hash(), tip);
        assert_eq!(inner.tip().unwrap(), tip);
        assert!(main.iter().all(|b| inner.is_applied(&b.hash()).unwrap()));
        assert!(side.iter().all(|b| !inner.is_applied(&b.hash()).unwrap()));

        // the refused block and its descendants are invalid, its ancestors are not
        assert!(side[2..].iter().all(|b| engine.is_invalid(&b.hash())));
        assert!(side[..2].iter().all(|b| !engine.is_invalid(&b.hash())));

        // a different heavier branch over the still-valid prefix is adopted
        let detour = branch(&side[1].header, 5, 3);
        let outcome = deliver_reversed(&engine, &detour, &peer(3));
        assert!(outcome.delta().is_some());
        assert_eq!(engine.get_tip().hash(), detour.last().unwrap().hash());
        assert_eq!(inner.tip().unwrap(), detour.last().unwrap().hash());
    }

    #[test]
    fn test_refused_extension_keeps_tip() {
        let engine = refusing_engine();
        let blocks = branch(&NetworkParams::regtest_genesis(), 2, 1);
        engine.storage().refuse.lock().insert(blocks[1].hash());

        submit_all(&engine, &blocks[..1], &peer(1));
        let outcome = engine.submit_block(blocks[1].clone(), &peer(1));
        assert_eq!(
            outcome.error().map(ConsensusError::kind),
            Some(ConsensusErrorKind::ConnectBlockFailed)
        );
        assert_eq!(engine.get_tip().hash(), blocks[0].hash());
        assert_eq!(engine.storage().inner.tip().unwrap(), blocks[0].hash());
    }

    #[test]
    fn test_readers_observe_committed_tips() {
        let engine = Arc::new(unit_work_engine(ConsensusConfig::regtest()));
        let genesis = NetworkParams::regtest_genesis();
        let main = branch(&genesis, 60, 1);
        let rival = branch(&main[9].header, 60, 2);
        let done = AtomicBool::new(false);

        std::thread::scope(|scope| {
            for _ in 0..3 {
                scope.spawn(|| {
                    let mut last_work = engine.get_tip().chain_work();
                    while !done.load(Ordering::Acquire) {
                        let tip = engine.get_tip();
                        // never behind a tip already seen
                        assert!(tip.chain_work() >= last_work);
                        last_work = tip.chain_work();
                        let root = engine.get_ancestor(&tip.hash(), 0).unwrap();
                        assert_eq!(root.hash(), genesis.hash());
                    }
                });
            }

            submit_all(engine.as_ref(), &main, &peer(1));
            deliver_reversed(engine.as_ref(), &rival, &peer(2));
            done.store(true, Ordering::Release);
        });

        assert_eq!(engine.get_tip().hash(), rival.last().unwrap().hash());
    }
}
