//! # Consensus Engine Benchmarks
//!
//! | Operation | Expectation |
//! |-----------|-------------|
//! | Block submission (extension) | validation + one storage apply |
//! | Ancestor lookup | O(log n) via skip pointers |
//! | Deep reorganization | linear in blocks moved |

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use ds_consensus::{ConsensusApi, ConsensusConfig, NetworkParams};
use ds_tests::fixtures::{branch, deliver_reversed, peer, submit_all, unit_work_engine};

fn bench_extend_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_block");
    let genesis = NetworkParams::regtest_genesis();

    for len in [100usize, 1_000] {
        let blocks = branch(&genesis, len, 0);
        group.bench_with_input(BenchmarkId::new("extend", len), &blocks, |b, blocks| {
            b.iter_batched(
                || unit_work_engine(ConsensusConfig::regtest()),
                |engine| {
                    submit_all(&engine, blocks, &peer(1));
                    black_box(engine.get_tip())
                },
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

fn bench_get_ancestor(c: &mut Criterion) {
    let engine = unit_work_engine(ConsensusConfig::regtest());
    let blocks = branch(&NetworkParams::regtest_genesis(), 10_000, 0);
    submit_all(&engine, &blocks, &peer(1));
    let tip = engine.get_tip().hash();

    let mut group = c.benchmark_group("get_ancestor");
    for height in [0u64, 5_000, 9_999] {
        group.bench_with_input(BenchmarkId::from_parameter(height), &height, |b, &height| {
            b.iter(|| black_box(engine.get_ancestor(&tip, height).unwrap()))
        });
    }
    group.finish();
}

fn bench_reorg(c: &mut Criterion) {
    let genesis = NetworkParams::regtest_genesis();
    let main = branch(&genesis, 200, 1);
    let rival = branch(&genesis, 201, 2);

    c.bench_function("reorg_200", |b| {
        b.iter_batched(
            || {
                let engine = unit_work_engine(ConsensusConfig::regtest());
                submit_all(&engine, &main, &peer(1));
                engine
            },
            |engine| black_box(deliver_reversed(&engine, &rival, &peer(2))),
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_extend_chain, bench_get_ancestor, bench_reorg);
criterion_main!(benches);
