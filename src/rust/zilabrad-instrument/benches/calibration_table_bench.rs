// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use zilabrad_common::types::{AwgPairKey, DeviceId};
use zilabrad_instrument::corrector::CalibrationTable;

fn create_table(n: usize) -> CalibrationTable {
    let mut table = CalibrationTable::new(AwgPairKey {
        device: DeviceId::new("dev8334"),
        awg_index: 0,
    })
    .unwrap();
    let rows = (0..n).map(|i| {
        let frequency = 4.0 + i as f64 * 1e-3;
        [frequency, 1e-3 * (i % 7) as f64, -1e-3 * (i % 5) as f64]
    });
    table.load(rows).unwrap();
    table
}

fn bench_offset_lookup(c: &mut Criterion) {
    let sizes = [16, 256, 4096];

    let mut group = c.benchmark_group("get_offset");
    for size in sizes {
        let table = create_table(size);
        let span = size as f64 * 1e-3;
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                // Sweep across the table and beyond both ends
                for step in -10..110 {
                    let frequency = 4.0 + span * f64::from(step) / 100.0;
                    black_box(table.get_offset(frequency));
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_offset_lookup);
criterion_main!(benches);
