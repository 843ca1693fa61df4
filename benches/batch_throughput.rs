//! Batch throughput benchmark
//!
//! Runs `run_batch` over a synthetic plate set with varying worker counts to
//! show how the scoped-thread chunking scales.
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench batch_throughput
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use cusum_flatten::batch::{run_batch, BatchOptions, Mode};
use cusum_flatten::decision::FlattenConfig;
use cusum_flatten::record::{parse_records, CurveRecord};

/// Mix of drifting negatives and amplification curves
fn plate(count: u64) -> Vec<CurveRecord> {
    (0..count)
        .map(|id| {
            let readings = (0..40)
                .map(|i| {
                    let x = i as f64;
                    if id % 3 == 0 {
                        100.0 + 900.0 / (1.0 + (-(x - 25.0) / 2.0).exp())
                    } else {
                        760.0 + 300.0 * (-x / (2.0 + (id % 5) as f64)).exp()
                    }
                })
                .collect();
            CurveRecord::new(id, readings)
        })
        .collect()
}

fn bench_batch_jobs(c: &mut Criterion) {
    let records = plate(384);
    let mut group = c.benchmark_group("batch_flatten");
    group.throughput(Throughput::Elements(records.len() as u64));

    for jobs in [1, 2, 4, 8] {
        let mut options = BatchOptions::new(Mode::Flatten, FlattenConfig::strict());
        options.jobs = jobs;
        options.seed = Some(7);

        group.bench_with_input(BenchmarkId::from_parameter(jobs), &options, |b, options| {
            b.iter(|| run_batch(black_box(records.clone()), options));
        });
    }

    group.finish();
}

fn bench_parse_records(c: &mut Criterion) {
    let mut csv = String::from("id,results");
    for i in 0..40 {
        csv.push_str(&format!(",readings{}", i));
    }
    csv.push('\n');
    for record in plate(384) {
        csv.push_str(&format!("{},30.5", record.id));
        for value in &record.readings {
            csv.push_str(&format!(",{}", value));
        }
        csv.push('\n');
    }

    c.bench_function("parse_records_384", |b| {
        b.iter(|| parse_records(black_box(&csv)));
    });
}

criterion_group!(benches, bench_batch_jobs, bench_parse_records);
criterion_main!(benches);
