//! Next-hop selection benchmarks
//!
//! Benchmarks for the per-packet neighbor table operations:
//! - Greedy selection
//! - Right-hand rule selection
//! - Purge by age and range
//!
//! Run with: cargo bench -p meridian-routing

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::time::Duration;

use meridian_core::{NodeId, Position, Role};
use meridian_routing::NeighborTable;

/// Neighbors spread on a ring around the origin
fn ring_table(count: u32, radius: f64) -> NeighborTable {
    let mut table = NeighborTable::default();
    for i in 0..count {
        let angle = f64::from(i) * std::f64::consts::TAU / f64::from(count);
        let position = Position::new(radius * angle.cos(), radius * angle.sin());
        table.upsert(NodeId::host(i + 1), position, Duration::ZERO);
    }
    table
}

fn bench_greedy(c: &mut Criterion) {
    let mut group = c.benchmark_group("greedy_selection");
    let target = Position::new(2000.0, 300.0);

    for count in [8, 32, 128] {
        let table = ring_table(count, 200.0);
        group.bench_function(format!("best_neighbor_{count}_neighbors"), |b| {
            b.iter(|| table.best_neighbor(black_box(target), black_box(Position::ORIGIN)))
        });
    }

    group.finish();
}

fn bench_recovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("recovery_selection");
    let reference = Position::new(-150.0, 40.0);

    for count in [8, 32, 128] {
        let table = ring_table(count, 200.0);
        group.bench_function(format!("best_angle_{count}_neighbors"), |b| {
            b.iter(|| table.best_angle(black_box(reference), black_box(Position::ORIGIN)))
        });
    }

    group.finish();
}

fn bench_purge(c: &mut Criterion) {
    let mut group = c.benchmark_group("neighbor_purge");

    group.bench_function("purge_128_half_stale", |b| {
        b.iter_batched(
            || {
                let mut table = ring_table(64, 200.0);
                for i in 0..64 {
                    table.upsert(
                        NodeId::host(1000 + i),
                        Position::new(f64::from(i), 0.0),
                        Duration::from_secs(3),
                    );
                }
                table
            },
            |mut table| table.purge(Position::ORIGIN, Role::Mobile, black_box(Duration::from_secs(4))),
            criterion::BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_greedy, bench_recovery, bench_purge);
criterion_main!(benches);
