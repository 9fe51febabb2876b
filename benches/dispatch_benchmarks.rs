use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use molecule_dispatch::workloads::{BarrierTouchTask, ReturnsMatrix};
use molecule_dispatch::{uniform_partition, weighted_partition, Aggregator};
use rand::Rng;
use std::sync::Arc;

fn random_returns(rows: usize, cols: usize) -> ReturnsMatrix {
    let mut rng = rand::thread_rng();
    ReturnsMatrix::from_fn(rows, cols, |_, _| rng.gen_range(-0.02..0.02))
}

fn benchmark_partitions(c: &mut Criterion) {
    c.bench_function("uniform_partition", |b| {
        b.iter(|| uniform_partition(black_box(1_000_000), black_box(64)))
    });
    c.bench_function("weighted_partition", |b| {
        b.iter(|| weighted_partition(black_box(1_000_000), black_box(64), false))
    });
}

fn benchmark_barrier_touch(c: &mut Criterion) {
    let returns = Arc::new(random_returns(1_000, 2_000));
    let atoms = BarrierTouchTask::new(Arc::clone(&returns), "molecule").atoms();

    let mut group = c.benchmark_group("barrier_touch");
    group.sample_size(10);
    for workers in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            let aggregator = Aggregator::new(BarrierTouchTask::new(Arc::clone(&returns), "molecule"))
                .num_workers(workers)
                .arg("width", 0.5)
                .progress(None);
            b.iter(|| aggregator.run(black_box(&atoms)))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_partitions, benchmark_barrier_touch);
criterion_main!(benches);
