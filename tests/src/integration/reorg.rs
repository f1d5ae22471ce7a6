//! Best-chain selection and reorganization through the full engine, with
//! storage backed by the key-value adapter.
//!
//! Uses unit work so that cumulative work is height + 1.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use ds_consensus::{
        ConsensusApi, ConsensusConfig, ConsensusError, ConsensusErrorKind, NetworkParams,
    };
    use primitive_types::U256;

    #[test]
    fn test_more_work_branch_replaces_tip() {
        let engine = unit_work_engine(ConsensusConfig::regtest());
        let genesis = NetworkParams::regtest_genesis();

        let trunk = branch(&genesis, 10, 0);
        let fork = trunk.last().unwrap().header;
        // tips with cumulative work 100 and 105
        let weaker = branch(&fork, 89, 1);
        let stronger = branch(&fork, 94, 2);

        submit_all(&engine, &trunk, &peer(1));
        submit_all(&engine, &weaker, &peer(1));
        let weak_tip = engine.get_tip();
        assert_eq!(weak_tip.chain_work(), U256::from(100));

        let outcome = deliver_reversed(&engine, &stronger, &peer(2));
        let tip = engine.get_tip();
        assert_eq!(tip.chain_work(), U256::from(105));
        assert_eq!(tip.hash(), stronger.last().unwrap().hash());

        let delta = outcome.delta().unwrap();
        let mut disconnected = hashes(&weaker);
        disconnected.reverse();
        assert_eq!(delta.fork_point, fork.hash());
        assert_eq!(delta.disconnected, disconnected);
        assert_eq!(delta.connected, hashes(&stronger));
        assert_eq!(delta.new_tip, tip.hash());

        let storage = engine.storage();
        assert_eq!(storage.tip().unwrap(), tip.hash());
        assert!(weaker.iter().all(|b| !storage.is_applied(&b.hash()).unwrap()));
        assert!(stronger.iter().all(|b| storage.is_applied(&b.hash()).unwrap()));
        assert!(trunk.iter().all(|b| storage.is_applied(&b.hash()).unwrap()));

        assert_eq!(engine.peers().deltas().last(), Some(delta));
    }

    #[test]
    fn test_equal_work_lower_hash_wins() {
        let engine = unit_work_engine(ConsensusConfig::regtest());
        let genesis = NetworkParams::regtest_genesis();
        let left = branch(&genesis, 3, 1);
        let right = branch(&genesis, 3, 2);

        submit_all(&engine, &left, &peer(1));
        deliver_reversed(&engine, &right, &peer(1));

        let expected = std::cmp::min(
            left.last().unwrap().hash(),
            right.last().unwrap().hash(),
        );
        assert_eq!(engine.get_tip().hash(), expected);
    }

    #[test]
    fn test_reorg_beyond_max_depth_rejected() {
        let engine = unit_work_engine(ConsensusConfig::regtest());
        assert_eq!(engine.config().max_reorg_depth, 500);
        let genesis = NetworkParams::regtest_genesis();

        let main = branch(&genesis, 501, 1);
        submit_all(&engine, &main, &peer(1));
        let tip = engine.get_tip();

        let rival = branch(&genesis, 502, 2);
        let outcome = deliver_reversed(&engine, &rival, &peer(2));

        assert_eq!(
            outcome.error(),
            Some(&ConsensusError::MaxReorgViolation {
                depth: 501,
                max_depth: 500
            })
        );
        assert_eq!(engine.get_tip().hash(), tip.hash());
        assert_eq!(engine.storage().tip().unwrap(), tip.hash());
        assert!(rival.iter().all(|b| engine.is_invalid(&b.hash())));
        assert_eq!(engine.peers().penalty_count(&peer(2)), 1);
    }

    #[test]
    fn test_reorg_at_max_depth_allowed() {
        let engine = unit_work_engine(ConsensusConfig::regtest().with_max_reorg_depth(20));
        let genesis = NetworkParams::regtest_genesis();

        submit_all(&engine, &branch(&genesis, 20, 1), &peer(1));
        let rival = branch(&genesis, 21, 2);
        let outcome = deliver_reversed(&engine, &rival, &peer(2));

        assert_eq!(outcome.delta().unwrap().depth(), 20);
        assert_eq!(engine.get_tip().hash(), rival.last().unwrap().hash());
    }

    #[test]
    fn test_checkpoint_pins_branch() {
        let genesis = NetworkParams::regtest_genesis();
        let main = branch(&genesis, 8, 1);
        let config = ConsensusConfig::regtest().with_checkpoint(5, main[4].hash());
        let engine = unit_work_engine(config);

        submit_all(&engine, &main[..3], &peer(1));

        // forks at height 2 and disagrees with the checkpoint at height 5
        let rogue = branch(&main[1].header, 6, 2);
        let outcomes: Vec<_> = rogue
            .iter()
            .map(|b| engine.submit_block(b.clone(), &peer(9)))
            .collect();

        assert!(outcomes[..2].iter().all(|o| o.is_accepted()));
        assert_eq!(
            outcomes[2].error().map(ConsensusError::kind),
            Some(ConsensusErrorKind::CheckpointMismatch)
        );
        assert!(outcomes[3..].iter().all(|o| {
            o.error().map(ConsensusError::kind) == Some(ConsensusErrorKind::InvalidAncestor)
        }));

        submit_all(&engine, &main[3..], &peer(1));
        assert_eq!(engine.get_tip().hash(), main[7].hash());
        assert!(engine.peers().penalty_count(&peer(9)) >= 1);
    }
}
