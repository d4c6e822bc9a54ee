//! Level-1 operations
//!
//! Generic over [`ElementwiseOp`] and [`ExactReduce`], so the same call works
//! on host, device, block and distributed containers. The output is always
//! the last mutable argument.

use crate::traits::{ElementwiseOp, ExactReduce, VResult};
use tracing::trace;

/// `y = x`
pub fn copy<V: ElementwiseOp>(x: &V, y: &mut V) -> VResult<(), V> {
    y.apply_with(x, |_, a| a)
}

/// `y = alpha·y`
pub fn scal<V: ElementwiseOp>(y: &mut V, alpha: f64) {
    y.apply(move |v| alpha * v);
}

/// `y = y + alpha`
pub fn plus<V: ElementwiseOp>(y: &mut V, alpha: f64) {
    y.apply(move |v| v + alpha);
}

/// `y = alpha·x + beta·y`
///
/// With `beta == 0` the old contents of `y` are not read, so a `NaN` left in
/// an uninitialized output does not leak into the result.
pub fn axpby<V: ElementwiseOp>(alpha: f64, x: &V, beta: f64, y: &mut V) -> VResult<(), V> {
    trace!(alpha, beta, "axpby");
    if beta == 0.0 {
        y.apply_with(x, move |_, a| alpha * a)
    } else if alpha == 0.0 {
        // still validate the operands
        y.apply_with(x, move |v, _| beta * v)
    } else {
        y.apply_with(x, move |v, a| alpha * a + beta * v)
    }
}

/// `z = alpha·x + beta·y + gamma·z`
pub fn axpbypgz<V: ElementwiseOp>(
    alpha: f64,
    x: &V,
    beta: f64,
    y: &V,
    gamma: f64,
    z: &mut V,
) -> VResult<(), V> {
    if gamma == 0.0 {
        z.apply_with2(x, y, move |_, a, b| alpha * a + beta * b)
    } else {
        z.apply_with2(x, y, move |v, a, b| alpha * a + beta * b + gamma * v)
    }
}

/// `y = alpha·x1·x2 + beta·y` elementwise
pub fn pointwise_dot<V: ElementwiseOp>(
    alpha: f64,
    x1: &V,
    x2: &V,
    beta: f64,
    y: &mut V,
) -> VResult<(), V> {
    if beta == 0.0 {
        y.apply_with2(x1, x2, move |_, a, b| alpha * a * b)
    } else {
        y.apply_with2(x1, x2, move |v, a, b| alpha * a * b + beta * v)
    }
}

/// `y = alpha·x1/x2 + beta·y` elementwise
pub fn pointwise_divide<V: ElementwiseOp>(
    alpha: f64,
    x1: &V,
    x2: &V,
    beta: f64,
    y: &mut V,
) -> VResult<(), V> {
    if beta == 0.0 {
        y.apply_with2(x1, x2, move |_, a, b| alpha * a / b)
    } else {
        y.apply_with2(x1, x2, move |v, a, b| alpha * a / b + beta * v)
    }
}

/// `y = f(x)` elementwise
pub fn transform<V, F>(x: &V, y: &mut V, f: F) -> VResult<(), V>
where
    V: ElementwiseOp,
    F: Fn(f64) -> f64 + Sync + Send,
{
    y.apply_with(x, move |_, a| f(a))
}

/// Correctly rounded `Σ x[i]·y[i]`
pub fn dot<V: ExactReduce>(x: &V, y: &V) -> VResult<f64, V> {
    Ok(x.dot_superacc(y)?.round())
}

/// Correctly rounded `Σ x[i]·y[i]·z[i]`
pub fn dot3<V: ExactReduce>(x: &V, y: &V, z: &V) -> VResult<f64, V> {
    Ok(x.dot3_superacc(y, z)?.round())
}

/// Ordinary floating-point dot product; not reproducible across layouts
pub fn fast_dot<V: ExactReduce>(x: &V, y: &V) -> VResult<f64, V> {
    x.fast_dot(y)
}

/// `sqrt(x·x)` from the exact dot product
pub fn norm2<V: ExactReduce>(x: &V) -> VResult<f64, V> {
    Ok(dot(x, x)?.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceVector;
    use crate::traits::HostAccess;
    use crate::vector::HostVector;
    use dgblas_core::execution::scalar_sequential;
    use dgblas_core::DeviceEngine;

    fn host(values: &[f64]) -> HostVector<dgblas_core::SequentialEngine<dgblas_core::ScalarBackend>> {
        HostVector::from_slice(scalar_sequential().with_chunk_size(2), values)
    }

    #[test]
    fn test_copy_scal_plus() {
        let x = host(&[1.0, 2.0, 3.0]);
        let mut y = host(&[0.0; 3]);
        copy(&x, &mut y).unwrap();
        assert_eq!(y.as_slice(), x.as_slice());
        scal(&mut y, 2.0);
        plus(&mut y, 1.0);
        assert_eq!(y.as_slice(), &[3.0, 5.0, 7.0]);
    }

    #[test]
    fn test_axpby_ignores_nan_when_beta_zero() {
        let x = host(&[1.0, 2.0]);
        let mut y = host(&[f64::NAN, f64::NAN]);
        axpby(3.0, &x, 0.0, &mut y).unwrap();
        assert_eq!(y.as_slice(), &[3.0, 6.0]);
        axpby(1.0, &x, -1.0, &mut y).unwrap();
        assert_eq!(y.as_slice(), &[-2.0, -4.0]);
        axpby(0.0, &x, 0.5, &mut y).unwrap();
        assert_eq!(y.as_slice(), &[-1.0, -2.0]);
        assert!(axpby(1.0, &host(&[1.0]), 1.0, &mut y).is_err());
    }

    #[test]
    fn test_axpbypgz() {
        let x = host(&[1.0, 1.0]);
        let y = host(&[2.0, 2.0]);
        let mut z = host(&[4.0, f64::NAN]);
        axpbypgz(1.0, &x, 1.0, &y, 0.0, &mut z).unwrap();
        assert_eq!(z.as_slice(), &[3.0, 3.0]);
        axpbypgz(1.0, &x, -1.0, &y, 2.0, &mut z).unwrap();
        assert_eq!(z.as_slice(), &[5.0, 5.0]);
    }

    #[test]
    fn test_pointwise() {
        let a = host(&[2.0, 3.0]);
        let b = host(&[4.0, 6.0]);
        let mut y = host(&[1.0, 1.0]);
        pointwise_dot(1.0, &a, &b, 1.0, &mut y).unwrap();
        assert_eq!(y.as_slice(), &[9.0, 19.0]);
        pointwise_divide(2.0, &b, &a, 0.0, &mut y).unwrap();
        assert_eq!(y.as_slice(), &[4.0, 4.0]);
        transform(&a, &mut y, |v| v * v).unwrap();
        assert_eq!(y.as_slice(), &[4.0, 9.0]);
    }

    #[test]
    fn test_dot_family() {
        let x = host(&[1e16, 1.0, -1e16]);
        let ones = host(&[1.0; 3]);
        assert_eq!(dot(&x, &ones).unwrap(), 1.0);
        assert_eq!(dot3(&x, &ones, &ones).unwrap(), 1.0);
        assert_eq!(fast_dot(&x, &ones).unwrap(), 0.0);
        assert_eq!(norm2(&host(&[3.0, 4.0])).unwrap(), 5.0);
    }

    #[test]
    fn test_same_calls_on_device() {
        let engine = DeviceEngine::with_block_size(2).unwrap();
        let x = DeviceVector::upload(engine.clone(), &[1e16, 1.0, -1e16]);
        let mut y = DeviceVector::zeros(engine, 3);
        axpby(1.0, &x, 0.0, &mut y).unwrap();
        plus(&mut y, 0.0);
        assert_eq!(y.download(), vec![1e16, 1.0, -1e16]);
        let ones = DeviceVector::upload(y.engine().clone(), &[1.0; 3]);
        assert_eq!(dot(&y, &ones).unwrap(), 1.0);
    }
}
