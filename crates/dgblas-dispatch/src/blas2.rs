//! Level-2 operations
//!
//! Free functions over [`MatVec`] and [`WeightedDot`]. Like level 1 they are
//! written once and dispatch on the container type.

use crate::blas1;
use crate::traits::{ElementwiseOp, MatVec, Operator, VResult, Vector, WeightedDot};
use dgblas_core::Error;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Accuracy of a weighted inner product
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DotMode {
    /// Ordinary floating-point accumulation
    Fast,
    /// Correctly rounded, independent of layout
    #[default]
    Exact,
}

/// `y = M·x`
pub fn gemv<M, V>(m: &M, x: &V, y: &mut V) -> VResult<(), V>
where
    M: MatVec<V>,
    V: Vector,
{
    m.gemv(x, y)
}

/// `y = alpha·M·x + beta·y`
pub fn gemv_scaled<M, V>(alpha: f64, m: &M, x: &V, beta: f64, y: &mut V) -> VResult<(), V>
where
    M: MatVec<V>,
    V: Vector,
{
    m.gemv_scaled(alpha, x, beta, y)
}

/// `y = alpha·M·x + beta·y` for symmetric `M`
///
/// Operand sizes are checked first. After that `alpha == 0` reduces to
/// `y = beta·y` without applying `M`, so it succeeds even for an unsymmetric
/// operator.
pub fn symv<M, V>(alpha: f64, m: &M, x: &V, beta: f64, y: &mut V) -> VResult<(), V>
where
    M: MatVec<V>,
    V: ElementwiseOp,
{
    m.check_operands(x, y)?;
    if alpha == 0.0 {
        trace!("symv with alpha = 0");
        if beta == 0.0 {
            y.fill(0.0);
        } else {
            blas1::scal(y, beta);
        }
        return Ok(());
    }
    if !m.is_symmetric() {
        return Err(Error::NotSymmetric(m.describe()).into());
    }
    m.gemv_scaled(alpha, x, beta, y)
}

/// Correctly rounded `x^T·M·y`
pub fn dot<M, V>(x: &V, m: &M, y: &V) -> VResult<f64, V>
where
    M: WeightedDot<V>,
    V: Vector,
{
    Ok(m.weighted_dot_superacc(x, y)?.round())
}

/// `x^T·M·y` with the requested accuracy
pub fn dot_with<M, V>(x: &V, m: &M, y: &V, mode: DotMode) -> VResult<f64, V>
where
    M: WeightedDot<V>,
    V: Vector,
{
    match mode {
        DotMode::Exact => dot(x, m, y),
        DotMode::Fast => m.weighted_fast_dot(x, y),
    }
}

/// `sqrt(x^T·M·x)`
pub fn norm2_weighted<M, V>(m: &M, x: &V) -> VResult<f64, V>
where
    M: WeightedDot<V>,
    V: Vector,
{
    Ok(dot(x, m, x)?.sqrt())
}
