//! Split one ill-conditioned dot product across growing thread groups and
//! compare the exact and the ordinary floating-point result.
//!
//! Run with `RUST_LOG=debug` to see the collective traffic. The single-node
//! reference runs on the engine chosen by the JSON execution config named in
//! `DGBLAS_CONFIG` (defaults otherwise).

use anyhow::{Context, Result};
use dgblas_core::execution::{lane_sequential, with_configured_engine, EngineVisitor};
use dgblas_core::{ExecutionConfig, ExecutionEngine, LaneBackend, ReductionPrimitives};
use dgblas_dispatch::HostVector;
use dgblas_distributed::{
    distributed_dot, distributed_fast_dot, DistributedVector, Partition, ThreadComm,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Exact dot of the whole vectors on one node
struct LocalDot<'a> {
    x: &'a [f64],
    y: &'a [f64],
}

impl<P: ReductionPrimitives> EngineVisitor<P> for LocalDot<'_> {
    type Output = (String, f64);

    fn visit<E: ExecutionEngine<Primitives = P>>(self, engine: E) -> Self::Output {
        let label = format!("{:?} x{}", engine.strategy(), engine.num_threads());
        (label, engine.exact_dot_superacc(self.x, self.y).round())
    }
}

fn load_config() -> Result<ExecutionConfig> {
    match std::env::var("DGBLAS_CONFIG") {
        Ok(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading execution config {path}"))?;
            Ok(ExecutionConfig::from_json_str(&json)?)
        }
        Err(_) => Ok(ExecutionConfig::default()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let n = 100_000;
    let x: Vec<f64> = (0..n)
        .map(|i| (if i % 2 == 0 { 1e10 } else { -1e10 }) + (i as f64) * 1e-6)
        .collect();
    let y = vec![1.0; n];

    let config = load_config()?;
    let (engine, local) =
        with_configured_engine(LaneBackend::try_new()?, &config, LocalDot { x: &x, y: &y })?;
    println!("local reference on {engine}: {local:.17e}");

    println!("{:>6} {:>24} {:>24}", "ranks", "exact", "fast");
    for ranks in [1, 2, 3, 8, 16] {
        let results = ThreadComm::run(ranks, |comm| -> Result<(f64, f64)> {
            let p = Arc::new(Partition::balanced(n, ranks));
            let make = |s: &[f64]| HostVector::from_slice(lane_sequential(), s);
            let dx = DistributedVector::scatter(&x, p.clone(), comm.clone(), make)?;
            let dy = DistributedVector::scatter(&y, p, comm, make)?;
            Ok((distributed_dot(&dx, &dy)?, distributed_fast_dot(&dx, &dy)?))
        });
        let (exact, fast) = results.into_iter().next().unwrap_or(Ok((f64::NAN, f64::NAN)))?;
        println!("{ranks:>6} {exact:>24.17e} {fast:>24.17e}");
    }
    Ok(())
}
