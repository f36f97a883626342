//! Benchmarks for identity resolution
//!
//! This benchmark measures:
//! - Index construction over a full contest ranking
//! - Exact resolution (hash lookups only)
//! - Partial resolution (containment scan over the index)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use resilient_harvest::matching::{variations, IdentityMatcher};
use resilient_harvest::types::{Record, TargetIdentity};

fn ranking(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            Record::new()
                .with("username", format!("coder_{}_{}", i % 97, i))
                .with("real_name", format!("Coder Number {}", i))
                .with("rank", i as u64 + 1)
        })
        .collect()
}

fn bench_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");
    for size in [1_000usize, 10_000, 30_000] {
        let records = ranking(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &records, |b, records| {
            b.iter(|| IdentityMatcher::new(black_box(records)).index_len())
        });
    }
    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let mut records = ranking(10_000);
    // only the last row contains the partial target, so the scan runs to the end
    records.push(
        Record::new()
            .with("username", "latecomer_zed")
            .with("rank", 10_001u64),
    );
    let matcher = IdentityMatcher::new(&records);
    let exact = TargetIdentity::new("Coder-42-5086", "");
    let partial = TargetIdentity::new("latecomerze", "");
    let missing = TargetIdentity::new("nobody-at-all", "");

    let mut group = c.benchmark_group("resolve");
    group.bench_function("exact", |b| b.iter(|| matcher.resolve(black_box(&exact))));
    group.bench_function("partial", |b| b.iter(|| matcher.resolve(black_box(&partial))));
    group.bench_function("unresolved", |b| b.iter(|| matcher.resolve(black_box(&missing))));
    group.finish();
}

fn bench_variations(c: &mut Criterion) {
    c.bench_function("variations", |b| {
        b.iter(|| variations(black_box("  John   Doe_1990 ")))
    });
}

criterion_group!(benches, bench_index_build, bench_resolve, bench_variations);
criterion_main!(benches);
