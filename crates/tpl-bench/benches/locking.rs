//! Lock manager benchmarks.
//!
//! Benchmarks for:
//! - Uncontended lock/unlock round trips
//! - `try_lock` conflict probes
//! - Wait-for graph construction and cycle search

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tpl_bench::utils::{hold_chain, quiet_manager};
use tpl_common::types::{ResourceId, TxnId};

/// Benchmark a single transaction locking and finishing.
fn bench_uncontended(c: &mut Criterion) {
    let mut group = c.benchmark_group("locking/uncontended");
    let lm = quiet_manager(4, 16);
    let txn_id = TxnId::new(0);

    group.bench_function("write_lock_finish", |b| {
        b.iter(|| {
            lm.begin(txn_id).expect("begin failed");
            lm.write_lock(txn_id, black_box(ResourceId::new(3)))
                .expect("write_lock failed");
            lm.finish(txn_id).expect("finish failed");
        });
    });

    group.bench_function("read_lock_finish", |b| {
        b.iter(|| {
            lm.begin(txn_id).expect("begin failed");
            lm.read_lock(txn_id, black_box(ResourceId::new(3)))
                .expect("read_lock failed");
            lm.finish(txn_id).expect("finish failed");
        });
    });

    for count in [1usize, 4, 16] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("lock_many_finish", count),
            &count,
            |b, &count| {
                b.iter(|| {
                    lm.begin(txn_id).expect("begin failed");
                    for rid in 0..count {
                        lm.write_lock(txn_id, ResourceId::new(rid))
                            .expect("write_lock failed");
                    }
                    lm.finish(txn_id).expect("finish failed");
                });
            },
        );
    }

    group.finish();
}

/// Benchmark a `try_lock` probe against a held resource.
fn bench_try_lock_conflict(c: &mut Criterion) {
    let mut group = c.benchmark_group("locking/try_lock_conflict");

    for len in [1usize, 8, 32] {
        let lm = quiet_manager(len + 1, len + 1);
        hold_chain(&lm, len);
        let probe = TxnId::new(0);
        lm.begin(probe).expect("begin failed");

        group.bench_with_input(BenchmarkId::new("holders", len), &len, |b, _| {
            b.iter(|| {
                let outcome = lm
                    .try_lock(probe, black_box(ResourceId::new(1)), false)
                    .expect("try_lock failed");
                black_box(outcome)
            });
        });
    }

    group.finish();
}

/// Benchmark building the wait-for graph and searching it for cycles.
fn bench_cycle_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("locking/cycle_search");

    for len in [8usize, 64] {
        let lm = quiet_manager(len + 1, len + 1);
        hold_chain(&lm, len);

        group.bench_with_input(BenchmarkId::new("chain", len), &len, |b, _| {
            b.iter(|| {
                let graph = lm.wait_for_graph();
                black_box(graph.find_cycles())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_uncontended,
    bench_try_lock_conflict,
    bench_cycle_search,
);
criterion_main!(benches);
