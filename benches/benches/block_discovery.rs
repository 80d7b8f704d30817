// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::Point;
use trackwork_blocks::{BlockConfig, BlockGraph, BlockPartitioner};
use trackwork_graph::{Endpoint, StraightGeometry, TrackId, TrackKind};

const SEG: f64 = 5.0;

fn plain(g: &mut BlockGraph, x: f64, y: f64) -> TrackId {
    g.create_with(
        TrackKind::Plain,
        vec![
            Endpoint::new(Point::new(x, y), 270.0),
            Endpoint::new(Point::new(x + SEG, y), 90.0),
        ],
    )
}

fn turnout(g: &mut BlockGraph, x: f64, y: f64) -> TrackId {
    g.create_with(
        TrackKind::Turnout,
        vec![
            Endpoint::new(Point::new(x, y), 270.0),
            Endpoint::new(Point::new(x + SEG, y), 90.0),
            Endpoint::new(Point::new(x + SEG, y + 1.0), 80.0),
        ],
    )
}

/// `lines` parallel lines of `runs` blocks each; every run is `per_run` segments
/// followed by a turnout.
fn build(lines: usize, runs: usize, per_run: usize) -> BlockGraph {
    let mut g = BlockGraph::new();
    for line in 0..lines {
        let y = line as f64 * 20.0;
        let mut x = 0.0;
        let mut prev: Option<TrackId> = None;
        for _ in 0..runs {
            for i in 0..=per_run {
                let id = if i == per_run {
                    turnout(&mut g, x, y)
                } else {
                    plain(&mut g, x, y)
                };
                if let Some(p) = prev {
                    g.connect(p, 1, id, 0).unwrap();
                }
                prev = Some(id);
                x += SEG;
            }
        }
    }
    g
}

fn bench_discover_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("discover_all");
    let geo = StraightGeometry::default();
    for &lines in &[4_usize, 16, 64] {
        let runs = 16;
        let per_run = 8;
        group.throughput(Throughput::Elements((lines * runs * per_run) as u64));
        group.bench_function(format!("lines{lines}_runs{runs}_seg{per_run}"), |b| {
            b.iter_batched(
                || build(lines, runs, per_run),
                |mut g| {
                    let mut p = BlockPartitioner::new(BlockConfig::default());
                    let created = p.discover_all(&mut g, &geo).unwrap();
                    black_box(created.len());
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_traverse(c: &mut Criterion) {
    let mut group = c.benchmark_group("traverse");
    let geo = StraightGeometry::default();
    for &n in &[64_usize, 1024] {
        let g = build(1, 1, n);
        let start = g.find(1).unwrap();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("chain_n{n}"), |b| {
            b.iter(|| black_box(g.traverse(start, 1, f64::INFINITY, &geo)));
        });
    }
    group.finish();
}

fn bench_load_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_layout");
    let geo = StraightGeometry::default();
    let mut g = build(16, 16, 8);
    BlockPartitioner::new(BlockConfig::default())
        .discover_all(&mut g, &geo)
        .unwrap();
    let mut text = String::new();
    trackwork_blocks::file::write_layout(&g, &mut text).unwrap();
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("lines16_runs16_seg8", |b| {
        b.iter(|| {
            let mut h = BlockGraph::new();
            let mut p = BlockPartitioner::new(BlockConfig::default());
            black_box(p.load_layout(&mut h, &geo, &text).unwrap());
        });
    });
    group.finish();
}

criterion_group!(benches, bench_discover_all, bench_traverse, bench_load_layout);
criterion_main!(benches);
