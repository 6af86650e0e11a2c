//! Benchmarks for grid planning and tile splitting.
//!
//! Run with: `cargo bench`
//!
//! Splitting runs against the in-memory backend so the numbers measure window
//! copying and scheduling rather than disk or TIFF encoding.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use lodtiles::{
    plan_grid, GeoTransform, GridOptions, MemoryDriver, MemoryRaster, Samples, SplitOptions,
    TileExtractor, TileSizing,
};

fn elevation(size: usize) -> MemoryRaster {
    let data: Vec<f32> = (0..size * size).map(|i| (i % 4096) as f32 * 0.25).collect();
    MemoryRaster::from_bands(size, size, vec![Samples::F32(data)])
        .unwrap()
        .with_geo_transform(GeoTransform::north_up(500_000.0, 5_520_000.0, 1.0, -1.0))
        .with_projection("EPSG:32633")
}

/// Benchmark planning for fine and coarse grids
fn bench_plan_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_grid");

    for tile_size in [64usize, 256, 1024] {
        let options = GridOptions::new(TileSizing::Size(tile_size));
        group.bench_with_input(BenchmarkId::new("tile_size", tile_size), &options, |b, options| {
            b.iter(|| plan_grid(black_box(16_384), black_box(16_384), options));
        });
    }

    group.finish();
}

/// Benchmark a full split, sequential against parallel
fn bench_split(c: &mut Criterion) {
    let source = elevation(2048);
    let mut group = c.benchmark_group("split_2048");
    group.sample_size(20);

    for (name, parallel) in [("sequential", false), ("parallel", true)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let driver = MemoryDriver::new();
                let mut options = SplitOptions::new(TileSizing::Size(256)).with_prefix("bench");
                options.parallel = parallel;
                TileExtractor::new(black_box(&source), &driver)
                    .options(options)
                    .run()
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_plan_grid, bench_split);

criterion_main!(benches);
