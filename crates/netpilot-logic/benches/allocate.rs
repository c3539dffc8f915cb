//! Allocator planning over large capacity maps.
//!
//! Run with: cargo bench -p netpilot-logic --bench allocate

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use netpilot_logic::allocator::{capacity_threads, plan};
use netpilot_logic::capacity::{CapacityMap, NodeCapacity};

fn map_of(size: usize) -> CapacityMap {
    CapacityMap::from_nodes(
        (0..size)
            .map(|i| {
                // Mix of full, tiny and roomy servers.
                let free = match i % 4 {
                    0 => 0.0,
                    1 => 3.5,
                    2 => 64.0,
                    _ => 1024.0,
                };
                NodeCapacity {
                    name: if i == 0 { "home".to_string() } else { format!("pserv-{}", i) },
                    free,
                    max: 1024.0,
                }
            })
            .collect(),
    )
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");
    for size in [25usize, 250, 2_500] {
        let map = map_of(size);
        let required = capacity_threads(&map, 1.75, "home", 32.0);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("fill_all", size), &map, |b, map| {
            b.iter(|| black_box(plan(map, 1.75, required, "home", 32.0)))
        });
        group.bench_with_input(BenchmarkId::new("fill_half", size), &map, |b, map| {
            b.iter(|| black_box(plan(map, 1.75, required / 2, "home", 32.0)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_plan);
criterion_main!(benches);
