// SPDX-License-Identifier: MIT OR Apache-2.0
//! Benchmarks for [`wf_merkle::MerkleAccumulator`] with varying leaf counts.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use wf_merkle::MerkleAccumulator;

fn leaf_bytes(i: usize) -> Vec<u8> {
    format!("leaf-{i}").into_bytes()
}

fn bench_append_by_leaf_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("merkle_append_by_leaf_count");

    for size in [0, 10, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut acc = MerkleAccumulator::new();
                for i in 0..size {
                    acc.append(black_box(&leaf_bytes(i)));
                }
                black_box(acc.root())
            });
        });
    }

    group.finish();
}

fn bench_proof_at_by_position(c: &mut Criterion) {
    let mut group = c.benchmark_group("merkle_proof_at_by_position");

    let mut acc = MerkleAccumulator::new();
    for i in 0..1_000 {
        acc.append(&leaf_bytes(i));
    }

    for index in [0usize, 499, 999] {
        group.bench_with_input(BenchmarkId::from_parameter(index), &index, |b, &index| {
            b.iter(|| acc.proof_at(black_box(index)).unwrap());
        });
    }

    group.finish();
}

fn bench_root_determinism(c: &mut Criterion) {
    let mut acc = MerkleAccumulator::new();
    for i in 0..200 {
        acc.append(&leaf_bytes(i));
    }
    c.bench_function("merkle_root_deterministic_200_leaves", |b| {
        b.iter(|| {
            let r1 = black_box(&acc).root();
            let r2 = black_box(&acc).root();
            assert_eq!(r1, r2);
        });
    });
}

criterion_group!(
    benches,
    bench_append_by_leaf_count,
    bench_proof_at_by_position,
    bench_root_determinism,
);
criterion_main!(benches);
