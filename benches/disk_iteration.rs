//! Benchmarks for disk channel iteration
//!
//! Tests throughput for:
//! - Sequential `next()` over a whole recording
//! - Random `seek()` across the recording
//! - Lap aggregation through the frame processor
//! - Session text queries
//!
//! Platform: Cross-platform (synthetic recordings, CI-safe)

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use irtelemetry::DiskChannel;
use irtelemetry::laps::LapAggregator;
use irtelemetry::session::query;
use irtelemetry::test_utils::{SESSION_YAML, lap_recording};
use std::hint::black_box;

const LAPS: usize = 50;

fn bench_sequential(c: &mut Criterion) {
    let bytes = lap_recording(LAPS, 0).build();
    let samples = DiskChannel::from_bytes(bytes.clone()).expect("fixture opens").sample_count();

    let mut group = c.benchmark_group("disk_iteration");
    group.throughput(Throughput::Elements(samples as u64));

    group.bench_function("next_all", |b| {
        b.iter_batched(
            || DiskChannel::from_bytes(bytes.clone()).expect("fixture opens"),
            |mut channel| {
                let mut frames = 0usize;
                while channel.next().expect("record loads") {
                    frames += 1;
                }
                black_box(frames)
            },
            criterion::BatchSize::LargeInput,
        )
    });

    group.bench_function("lap_aggregation", |b| {
        b.iter_batched(
            || DiskChannel::from_bytes(bytes.clone()).expect("fixture opens"),
            |mut channel| black_box(LapAggregator::collect(&mut channel).expect("laps")),
            criterion::BatchSize::LargeInput,
        )
    });

    group.finish();
}

fn bench_seek(c: &mut Criterion) {
    let mut channel = DiskChannel::from_bytes(lap_recording(LAPS, 0).build()).expect("fixture opens");
    let count = channel.sample_count();
    let mut index = 0usize;

    c.bench_function("disk_seek_stride", |b| {
        b.iter(|| {
            index = (index + 7919) % count;
            black_box(channel.seek(black_box(index)).expect("seek"))
        })
    });
}

fn bench_session_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_query");
    group.bench_function("weekend_track", |b| {
        b.iter(|| black_box(query(black_box(SESSION_YAML), "WeekendInfo:TrackName:")))
    });
    group.bench_function("driver_filter", |b| {
        b.iter(|| black_box(query(black_box(SESSION_YAML), "DriverInfo:Drivers:CarIdx:{1}UserName:")))
    });
    group.finish();
}

criterion_group!(benches, bench_sequential, bench_seek, bench_session_query);
criterion_main!(benches);
