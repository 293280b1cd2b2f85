//! Benchmarks for hydrology algorithms

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use flowtrace_algorithms::hydrology::{
    flow_accumulation, longest_flow_path, stream_lines, subwatersheds, AccumulationParams,
    ConfluenceMode, FlowGrid, LongestFlowPathParams, OutletCell, StreamParams, Traversal,
};
use flowtrace_core::raster::neighbors::NEIGHBORS;
use flowtrace_core::{Direction, GeoTransform};

/// Directions of a bowl draining toward the center cell
fn create_basin_grid(size: usize) -> FlowGrid {
    let center = size as f64 / 2.0;
    let elevation = |row: usize, col: usize| {
        let dx = col as f64 - center;
        let dy = row as f64 - center;
        // Bowl shape + small noise to avoid flat areas
        let noise = ((row * 7 + col * 13) % 17) as f64 * 0.01;
        (dx * dx + dy * dy).sqrt() + noise
    };

    let mut dirs = Vec::with_capacity(size * size);
    for row in 0..size {
        for col in 0..size {
            let z = elevation(row, col);
            let mut best = (0.0, Direction::None);
            for n in &NEIGHBORS {
                let Some((nr, nc)) = n.cell(row, col, size, size) else {
                    continue;
                };
                let dist = if n.is_diagonal() { 2f64.sqrt() } else { 1.0 };
                let drop = (z - elevation(nr, nc)) / dist;
                if drop > best.0 {
                    best = (drop, Direction::from_offset(n.dr, n.dc));
                }
            }
            dirs.push(best.1);
        }
    }

    let mut grid = FlowGrid::from_directions(&dirs, size, size).unwrap();
    grid.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));
    grid
}

fn bench_flow_accumulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/flow_accumulation");
    for size in [256, 512, 1024] {
        let flow = create_basin_grid(size);
        group.bench_with_input(BenchmarkId::new("iterative", size), &size, |b, _| {
            b.iter(|| flow_accumulation(black_box(&flow), None, AccumulationParams::default()).unwrap())
        });
        let recursive = AccumulationParams {
            traversal: Traversal::recursive(),
            ..Default::default()
        };
        group.bench_with_input(BenchmarkId::new("recursive", size), &size, |b, _| {
            b.iter(|| flow_accumulation(black_box(&flow), None, recursive).unwrap())
        });
    }
    group.finish();
}

fn bench_subwatersheds(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/subwatersheds");
    for size in [256, 512, 1024] {
        let flow = create_basin_grid(size);
        let mid = size / 2;
        let outlets = [
            OutletCell::new(mid, mid, 1),
            OutletCell::new(mid / 2, mid / 2, 2),
            OutletCell::new(mid + mid / 2, mid / 2, 3),
        ];
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| subwatersheds(black_box(flow.clone()), &outlets, Traversal::Iterative).unwrap())
        });
    }
    group.finish();
}

fn bench_stream_lines(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/stream_lines");
    for size in [256, 512, 1024] {
        let flow = create_basin_grid(size);
        let acc = flow_accumulation(&flow, None, AccumulationParams::default()).unwrap();
        for mode in [ConfluenceMode::Split, ConfluenceMode::Continuous] {
            let params = StreamParams {
                threshold: 100.0,
                confluence: mode,
            };
            group.bench_with_input(BenchmarkId::new(format!("{:?}", mode), size), &size, |b, _| {
                b.iter(|| stream_lines(black_box(&flow), &acc, params).unwrap())
            });
        }
    }
    group.finish();
}

fn bench_longest_flow_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/longest_flow_path");
    for size in [128, 256, 512] {
        let flow = create_basin_grid(size);
        let acc = flow_accumulation(&flow, None, AccumulationParams::default()).unwrap();
        let outlet = OutletCell::new(size / 2, size / 2, 1);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| longest_flow_path(black_box(&flow), &acc, &outlet, LongestFlowPathParams::default()).unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_flow_accumulation,
    bench_subwatersheds,
    bench_stream_lines,
    bench_longest_flow_path,
);
criterion_main!(benches);
