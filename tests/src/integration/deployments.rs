//! Version-bits activation on regtest windows (`W=144`, `T=108`).
//!
//! Headers are mined against the real regtest target.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use ds_consensus::{ConsensusApi, ConsensusConfig, NetworkParams, ThresholdState};
    use shared_types::Block;

    const TESTDUMMY_BIT: u32 = 1 << 28;
    const SIGNAL: u32 = BASE_VERSION | TESTDUMMY_BIT;

    /// Mine and submit `len` blocks on the regtest genesis; the block at
    /// height `h` signals when `signals(h)` is true.
    fn mined_chain<F: Fn(u64) -> bool>(len: usize, signals: F) -> (TestEngine, Vec<Block>) {
        let engine = pow_engine(ConsensusConfig::regtest());
        let genesis = NetworkParams::regtest_genesis();
        let blocks = branch_with(&genesis, len, 0, true, |index| {
            if signals(index as u64 + 1) {
                SIGNAL
            } else {
                BASE_VERSION
            }
        });
        submit_all(&engine, &blocks, &peer(1));
        (engine, blocks)
    }

    fn state(engine: &TestEngine, id: &str, height: u64) -> ThresholdState {
        engine.get_deployment_state(id, height).unwrap()
    }

    #[test]
    fn test_activation_heights() {
        let (engine, _) = mined_chain(431, |_| true);
        assert_eq!(engine.get_tip().height(), 431);

        for height in [0, 1, 100, 142] {
            assert_eq!(state(&engine, "testdummy", height), ThresholdState::Defined);
        }
        assert_eq!(state(&engine, "testdummy", 143), ThresholdState::Started);
        assert_eq!(state(&engine, "testdummy", 286), ThresholdState::Started);
        assert_eq!(state(&engine, "testdummy", 287), ThresholdState::LockedIn);
        assert_eq!(state(&engine, "testdummy", 430), ThresholdState::LockedIn);
        assert_eq!(state(&engine, "testdummy", 431), ThresholdState::Active);

        // nobody signalled for csv
        assert_eq!(state(&engine, "csv", 287), ThresholdState::Started);
        assert_eq!(state(&engine, "csv", 431), ThresholdState::Started);
    }

    #[test]
    fn test_states_never_regress_over_every_header() {
        // window 144..=287 stays quiet, 288..=431 locks in
        let (engine, _) = mined_chain(575, |h| h >= 288);
        let order = |state: ThresholdState| match state {
            ThresholdState::Defined => 0,
            ThresholdState::Started => 1,
            ThresholdState::LockedIn => 2,
            ThresholdState::Active | ThresholdState::Failed => 3,
        };

        for id in ["csv", "segwit", "testdummy"] {
            let mut previous = state(&engine, id, 0);
            for height in 1..=575 {
                let current = state(&engine, id, height);
                assert!(
                    order(current) >= order(previous),
                    "{id}: {previous:?} -> {current:?} at height {height}"
                );
                if previous.is_terminal() {
                    assert_eq!(current, previous, "{id} left a terminal state at {height}");
                }
                previous = current;
            }
        }
        assert_eq!(state(&engine, "testdummy", 431), ThresholdState::LockedIn);
        assert_eq!(state(&engine, "testdummy", 575), ThresholdState::Active);
        assert_eq!(state(&engine, "csv", 575), ThresholdState::Started);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // exactly 108 of headers 144..=287 signal
        let (engine, _) = mined_chain(287, |h| (144..144 + 108).contains(&h));
        assert_eq!(state(&engine, "testdummy", 287), ThresholdState::LockedIn);
    }

    #[test]
    fn test_one_short_stays_started() {
        let (engine, blocks) = mined_chain(287, |h| (144..144 + 107).contains(&h));
        assert_eq!(state(&engine, "testdummy", 287), ThresholdState::Started);

        // the next window starts counting afresh
        let last = blocks.last().unwrap().header;
        let more = branch_with(&last, 144, 1, true, |_| SIGNAL);
        submit_all(&engine, &more, &peer(1));
        assert_eq!(state(&engine, "testdummy", 430), ThresholdState::Started);
        assert_eq!(state(&engine, "testdummy", 431), ThresholdState::LockedIn);
    }

    #[test]
    fn test_signalling_statistics() {
        let (engine, _) = mined_chain(200, |h| h >= 144 && h % 2 == 0);
        let stats = engine.deployment_statistics("testdummy").unwrap();

        assert_eq!(stats.state, ThresholdState::Started);
        assert_eq!(stats.period, 144);
        assert_eq!(stats.threshold, 108);
        // headers 144..=200 are in the current window
        assert_eq!(stats.elapsed, 57);
        assert_eq!(stats.count, 29);
        assert!(stats.possible);
    }

    #[test]
    fn test_unknown_deployment_and_height() {
        let (engine, _) = mined_chain(3, |_| false);
        assert!(engine.get_deployment_state("taproot", 1).is_err());
        assert!(engine.get_deployment_state("csv", 4).is_err());
    }
}
