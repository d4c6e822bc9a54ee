//! Benchmarks comparing exact and fast dot products per backend

use criterion::measurement::WallTime;
use criterion::{
    black_box, criterion_group, criterion_main, BenchmarkGroup, BenchmarkId, Criterion,
};
use dgblas_core::execution::{
    lane_sequential, scalar_sequential, with_configured_engine, EngineVisitor, ExecutionEngine,
};
use dgblas_core::{DeviceBuffer, DeviceEngine, ExecutionConfig, LaneBackend, ReductionPrimitives};

/// Generate test data with specific patterns
fn generate_test_data(size: usize, phase: f64) -> Vec<f64> {
    (0..size)
        .map(|i| ((i as f64 + phase) * 0.1).sin() * 10f64.powi((i % 11) as i32 - 5))
        .collect()
}

fn bench_dot(c: &mut Criterion) {
    let mut group = c.benchmark_group("dot");

    for &size in &[1_000usize, 100_000, 1_000_000] {
        let x = generate_test_data(size, 0.0);
        let y = generate_test_data(size, 0.5);

        let scalar = scalar_sequential();
        group.bench_with_input(BenchmarkId::new("fast", size), &size, |b, _| {
            b.iter(|| black_box(scalar.fast_dot(&x, &y)))
        });
        group.bench_with_input(BenchmarkId::new("exact_scalar", size), &size, |b, _| {
            b.iter(|| black_box(scalar.exact_dot_superacc(&x, &y).round()))
        });

        let lanes = lane_sequential();
        group.bench_with_input(BenchmarkId::new("exact_lanes", size), &size, |b, _| {
            b.iter(|| black_box(lanes.exact_dot_superacc(&x, &y).round()))
        });

        #[cfg(feature = "parallel")]
        {
            let parallel = dgblas_core::execution::lane_parallel();
            group.bench_with_input(BenchmarkId::new("exact_parallel", size), &size, |b, _| {
                b.iter(|| black_box(parallel.exact_dot_superacc(&x, &y).round()))
            });
        }

        if let Ok(device) = DeviceEngine::new() {
            let dx = DeviceBuffer::upload(&x);
            let dy = DeviceBuffer::upload(&y);
            group.bench_with_input(BenchmarkId::new("exact_device", size), &size, |b, _| {
                b.iter(|| black_box(device.exact_dot_superacc(dx.as_f64(), dy.as_f64()).round()))
            });
        }
    }

    group.finish();
}

/// Benchmarks the exact dot on whichever engine a configuration selects
struct ExactDotOn<'a, 'g> {
    group: &'a mut BenchmarkGroup<'g, WallTime>,
    id: BenchmarkId,
    x: &'a [f64],
    y: &'a [f64],
}

impl<P: ReductionPrimitives> EngineVisitor<P> for ExactDotOn<'_, '_> {
    type Output = ();

    fn visit<E: ExecutionEngine<Primitives = P>>(self, engine: E) {
        let (x, y) = (self.x, self.y);
        self.group.bench_function(self.id, |b| {
            b.iter(|| black_box(engine.exact_dot_superacc(x, y).round()))
        });
    }
}

fn bench_configured_threads(c: &mut Criterion) {
    let mut group = c.benchmark_group("dot_configured");
    let size = 1_000_000;
    let x = generate_test_data(size, 0.0);
    let y = generate_test_data(size, 0.5);

    #[allow(unused_mut)]
    let mut configs = vec![("sequential".to_string(), ExecutionConfig::sequential())];
    #[cfg(feature = "parallel")]
    for threads in [1, 2, 4, 8] {
        configs.push((
            format!("parallel_{threads}"),
            ExecutionConfig::parallel().with_num_threads(threads),
        ));
    }

    for (name, config) in &configs {
        let visitor = ExactDotOn {
            group: &mut group,
            id: BenchmarkId::new(name.as_str(), size),
            x: &x,
            y: &y,
        };
        with_configured_engine(LaneBackend::new(), config, visitor)
            .expect("benchmark configuration is valid");
    }

    group.finish();
}

fn bench_superacc_accumulate(c: &mut Criterion) {
    let data = generate_test_data(100_000, 0.25);
    c.bench_function("superacc_accumulate_100k", |b| {
        b.iter(|| {
            let mut acc = dgblas_core::Superaccumulator::new();
            acc.accumulate_slice(black_box(&data));
            black_box(acc.round())
        })
    });
}

criterion_group!(
    benches,
    bench_dot,
    bench_configured_threads,
    bench_superacc_accumulate
);
criterion_main!(benches);
