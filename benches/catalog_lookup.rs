//! Benchmarks for variable resolution
//!
//! Compares:
//! - Cold catalog scans by name across catalog sizes
//! - Cached handle reads (generation check only)
//! - Typed getter coercion
//!
//! Platform: Cross-platform (synthetic recordings, CI-safe)

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use irtelemetry::test_utils::IbtFixtureBuilder;
use irtelemetry::{DiskChannel, TelemetrySource, VariableHandle, VariableType};
use std::hint::black_box;

/// Recording with `count` float variables plus `Speed` last, one sample loaded.
fn channel_with_variables(count: usize) -> DiskChannel {
    let mut builder = IbtFixtureBuilder::new();
    for i in 0..count {
        builder = builder.variable(&format!("Var{i}"), VariableType::Float32, 1);
    }
    let bytes = builder
        .variable("Speed", VariableType::Float32, 1)
        .samples(1, |_, s| {
            s.set_f32("Speed", 55.5);
        })
        .build();
    let mut channel = DiskChannel::from_bytes(bytes).expect("fixture opens");
    channel.next().expect("fixture has a sample");
    channel
}

fn bench_index_of(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalog_index_of");
    for size in [16usize, 128, 512] {
        let channel = channel_with_variables(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &channel, |b, channel| {
            b.iter(|| black_box(channel.catalog().index_of(black_box("Speed"))))
        });
    }
    group.finish();
}

fn bench_handle_reads(c: &mut Criterion) {
    let channel = channel_with_variables(512);
    let mut group = c.benchmark_group("handle_reads");

    let mut speed = VariableHandle::new("Speed");
    group.bench_function("cached_get_f32", |b| b.iter(|| black_box(speed.get_f32(&channel, 0))));

    let mut coerced = VariableHandle::new("Speed");
    group.bench_function("cached_get_f64", |b| b.iter(|| black_box(coerced.get_f64(&channel, 0))));

    group.bench_function("cold_resolve", |b| {
        b.iter(|| {
            let mut handle = VariableHandle::new("Speed");
            black_box(handle.resolve(&channel))
        })
    });

    let mut missing = VariableHandle::new("NotPublished");
    group.bench_function("missing_variable_default", |b| {
        b.iter(|| black_box(missing.get_f32(&channel, 0)))
    });

    group.finish();
}

criterion_group!(benches, bench_index_of, bench_handle_reads);
criterion_main!(benches);
