//! Criterion benchmarks for the per-tick rendering path.
//!
//! Every sample tick converts N raw codes and renders one record line, so these bound
//! how short the sample period can get.
//!
//! Run with: cargo bench --bench record_format

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use insole_logger::acquisition::{
    Calibration, ChannelArray, ChannelValue, OutputMode, RangeMap, RecordFormatter, Sample,
};

fn channel_array(n: usize, mode: OutputMode) -> ChannelArray {
    ChannelArray::new(
        (0..n).map(|i| {
            (
                format!("f{i}"),
                i as u8,
                Calibration {
                    slope: 0.8,
                    intercept: 1.5,
                },
            )
        }),
        RangeMap::adc_to_millivolts(1023, 5000),
        mode,
    )
}

/// Render one record for growing channel counts.
fn render_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_record");

    for n in [5usize, 10, 32] {
        let channels = channel_array(n, OutputMode::Scaled);
        let formatter = RecordFormatter::new(channels.names());
        let sample = Sample {
            relative_ms: 123_456,
            epoch_seconds: 1_600_000_000,
            sync: 2500,
            channels: (0..n as i32).map(|i| ChannelValue::Scaled(i * 37)).collect(),
        };

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("scaled", n), &sample, |b, sample| {
            b.iter(|| formatter.render(black_box(sample)).unwrap());
        });
    }

    group.finish();
}

/// Convert raw codes for both output modes.
fn convert_channels(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert_channels");

    for (name, mode) in [("scaled", OutputMode::Scaled), ("calibrated", OutputMode::Calibrated)] {
        let channels = channel_array(10, mode);
        group.bench_function(name, |b| {
            b.iter(|| {
                channels
                    .channels()
                    .iter()
                    .map(|ch| channels.convert(ch, black_box(700)))
                    .collect::<Vec<_>>()
            });
        });
    }

    group.finish();
}

/// Echo rendering happens once per sync tick; kept for comparison.
fn render_echo(c: &mut Criterion) {
    let channels = channel_array(10, OutputMode::Calibrated);
    let formatter = RecordFormatter::new(channels.names());
    let sample = Sample {
        relative_ms: 1000,
        epoch_seconds: 1_600_000_000,
        sync: 0,
        channels: vec![ChannelValue::Force(12.345); 10],
    };

    c.bench_function("render_echo", |b| {
        b.iter(|| formatter.render_echo(black_box(&sample)).unwrap());
    });
}

criterion_group!(benches, render_record, convert_channels, render_echo);
criterion_main!(benches);
