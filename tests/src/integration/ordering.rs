//! Arrival-order independence, duplicates and orphans.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use ds_consensus::{
        ConsensusApi, ConsensusConfig, ConsensusError, ConsensusErrorKind, NetworkParams,
        ThresholdState,
    };
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use shared_types::{Block, Hash};

    /// trunk(6) with three side branches, two of them tied on work.
    fn block_tree() -> Vec<Block> {
        let genesis = NetworkParams::regtest_genesis();
        let trunk = branch(&genesis, 6, 0);
        let left = branch(&trunk[3].header, 4, 1);
        let right = branch(&trunk[3].header, 4, 2);
        let short = branch(&trunk[1].header, 3, 3);
        [trunk, left, right, short].concat()
    }

    /// Deliver `blocks` in the given order, retrying orphans after each
    /// pass the way a node's orphan pool would.
    fn deliver_shuffled(engine: &TestEngine, mut pending: Vec<Block>, rng: &mut StdRng) {
        while !pending.is_empty() {
            let mut retry = Vec::new();
            for block in pending {
                // some peers announce headers before bodies
                if rng.gen_bool(0.3) {
                    engine.submit_header(block.header, &peer(1));
                }
                let outcome = engine.submit_block(block.clone(), &peer(1));
                match outcome.error().map(ConsensusError::kind) {
                    None => {}
                    Some(ConsensusErrorKind::OrphanHeader) => retry.push(block),
                    Some(other) => panic!("unexpected rejection: {other:?}"),
                }
            }
            pending = retry;
        }
    }

    fn snapshot(engine: &TestEngine, blocks: &[Block]) -> (Hash, Vec<Vec<ThresholdState>>) {
        let states = blocks
            .iter()
            .map(|b| engine.get_header(&b.hash()).unwrap().deployment_states().to_vec())
            .collect();
        (engine.get_tip().hash(), states)
    }

    #[test]
    fn test_arrival_order_does_not_change_outcome() {
        let blocks = block_tree();

        let reference = unit_work_engine(ConsensusConfig::regtest());
        submit_all(&reference, &blocks, &peer(1));
        let expected = snapshot(&reference, &blocks);

        let tip = reference.get_tip();
        assert_eq!(tip.height(), 8);
        let left_tip = blocks[9].hash();
        let right_tip = blocks[13].hash();
        assert_eq!(tip.hash(), left_tip.min(right_tip));

        for seed in 0..8 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut order = blocks.clone();
            order.shuffle(&mut rng);

            let engine = unit_work_engine(ConsensusConfig::regtest());
            deliver_shuffled(&engine, order, &mut rng);
            assert_eq!(snapshot(&engine, &blocks), expected, "seed {seed}");
            assert_eq!(engine.storage().tip().unwrap(), expected.0);
        }
    }

    #[test]
    fn test_duplicates_are_idempotent() {
        let engine = unit_work_engine(ConsensusConfig::regtest());
        let blocks = branch(&NetworkParams::regtest_genesis(), 3, 0);
        submit_all(&engine, &blocks, &peer(1));
        let deltas = engine.peers().deltas().len();

        for block in &blocks {
            let header = engine.submit_header(block.header, &peer(2));
            let body = engine.submit_block(block.clone(), &peer(2));
            assert!(header.is_duplicate() && body.is_duplicate());
            assert!(body.delta().is_none());
        }
        assert_eq!(engine.peers().deltas().len(), deltas);
        assert_eq!(engine.peers().penalty_count(&peer(2)), 0);
    }

    #[test]
    fn test_orphan_accepted_once_parent_arrives() {
        let engine = unit_work_engine(ConsensusConfig::regtest());
        let blocks = branch(&NetworkParams::regtest_genesis(), 2, 0);

        let early = engine.submit_block(blocks[1].clone(), &peer(3));
        assert_eq!(
            early.error().map(ConsensusError::kind),
            Some(ConsensusErrorKind::OrphanHeader)
        );
        assert!(engine.get_header(&blocks[1].hash()).is_none());
        assert!(!engine.is_invalid(&blocks[1].hash()));
        assert_eq!(engine.peers().penalty_count(&peer(3)), 0);

        submit_all(&engine, &blocks, &peer(3));
        assert_eq!(engine.get_tip().hash(), blocks[1].hash());
    }
}
