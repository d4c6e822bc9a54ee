//! Local exact dot products
//!
//! Entry points for reductions over plain slices. Results are correctly
//! rounded and identical for every backend, chunk size and thread count.
//! Hosts without a correctly rounded fused multiply-add get
//! [`Error::FeatureNotAvailable`](crate::Error::FeatureNotAvailable) instead
//! of a result.
//!
//! ```rust
//! use dgblas_core::exdot::{exact_dot, exact_sum};
//!
//! assert_eq!(exact_sum(&[1e16, 1.0, -1e16]).unwrap(), 1.0);
//! assert_eq!(exact_dot(&[1e16, 1.0, -1e16], &[1.0; 3]).unwrap(), 1.0);
//! assert!(exact_dot(&[1.0], &[1.0, 2.0]).is_err());
//! ```

use crate::error::{check_same_len, Result};
use crate::execution::{ExecutionEngine, SequentialEngine};
use crate::primitives::LaneBackend;
use crate::superacc::Superaccumulator;

// Fails with `FeatureNotAvailable` when the backend could not be built.
fn local_engine(backend: Result<LaneBackend>) -> Result<SequentialEngine<LaneBackend>> {
    Ok(SequentialEngine::new(backend?))
}

fn dot_superacc(backend: Result<LaneBackend>, x: &[f64], y: &[f64]) -> Result<Superaccumulator> {
    check_same_len(x.len(), y.len(), "exact_dot")?;
    Ok(local_engine(backend)?.exact_dot_superacc(x, y))
}

fn dot3_superacc(
    backend: Result<LaneBackend>,
    x: &[f64],
    y: &[f64],
    z: &[f64],
) -> Result<Superaccumulator> {
    check_same_len(x.len(), y.len(), "exact_dot3")?;
    check_same_len(x.len(), z.len(), "exact_dot3")?;
    Ok(local_engine(backend)?.exact_dot3_superacc(x, y, z))
}

fn sum_superacc(backend: Result<LaneBackend>, x: &[f64]) -> Result<Superaccumulator> {
    Ok(local_engine(backend)?.exact_sum_superacc(x))
}

/// Exact Σ x[i]·y[i] as a superaccumulator
pub fn exact_dot_superacc(x: &[f64], y: &[f64]) -> Result<Superaccumulator> {
    dot_superacc(LaneBackend::try_new(), x, y)
}

/// Exact Σ x[i]·y[i]·z[i] as a superaccumulator
pub fn exact_dot3_superacc(x: &[f64], y: &[f64], z: &[f64]) -> Result<Superaccumulator> {
    dot3_superacc(LaneBackend::try_new(), x, y, z)
}

/// Correctly rounded Σ x[i]·y[i]
pub fn exact_dot(x: &[f64], y: &[f64]) -> Result<f64> {
    Ok(exact_dot_superacc(x, y)?.round())
}

/// Correctly rounded Σ x[i]·y[i]·z[i]
pub fn exact_dot3(x: &[f64], y: &[f64], z: &[f64]) -> Result<f64> {
    Ok(exact_dot3_superacc(x, y, z)?.round())
}

/// Correctly rounded Σ x[i]
pub fn exact_sum(x: &[f64]) -> Result<f64> {
    Ok(sum_superacc(LaneBackend::try_new(), x)?.round())
}

/// [`exact_dot`] driven by an explicit engine
pub fn exact_dot_with<E: ExecutionEngine>(engine: &E, x: &[f64], y: &[f64]) -> Result<f64> {
    check_same_len(x.len(), y.len(), "exact_dot")?;
    Ok(engine.exact_dot_superacc(x, y).round())
}

/// [`exact_dot3`] driven by an explicit engine
pub fn exact_dot3_with<E: ExecutionEngine>(
    engine: &E,
    x: &[f64],
    y: &[f64],
    z: &[f64],
) -> Result<f64> {
    check_same_len(x.len(), y.len(), "exact_dot3")?;
    check_same_len(x.len(), z.len(), "exact_dot3")?;
    Ok(engine.exact_dot3_superacc(x, y, z).round())
}
