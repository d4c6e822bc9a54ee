//! Diagonal operators
//!
//! Weights of a discretization and Jacobi-type preconditioners. The weighted
//! inner product `x^T·D·y` reduces all three operands in one exact pass.

use super::check_dims;
use crate::device::DeviceVector;
use crate::traits::{HostAccess, MatVec, Operator, VResult, Vector, WeightedDot};
use crate::vector::HostVector;
use dgblas_core::{DiagonalTag, Error, ExecutionEngine, Result, Superaccumulator};

/// Diagonal matrix `diag(d)`
#[derive(Clone, Debug, PartialEq)]
pub struct DiagonalMatrix {
    diagonal: Vec<f64>,
}

impl DiagonalMatrix {
    pub fn new(diagonal: Vec<f64>) -> Self {
        Self { diagonal }
    }

    pub fn identity(n: usize) -> Self {
        Self::new(vec![1.0; n])
    }

    /// Elementwise reciprocal; fails on a zero entry
    pub fn inverse(&self) -> Result<Self> {
        if let Some(i) = self.diagonal.iter().position(|&d| d == 0.0) {
            return Err(Error::InvalidInput(format!("diagonal entry {i} is zero")));
        }
        Ok(Self::new(self.diagonal.iter().map(|d| 1.0 / d).collect()))
    }

    pub fn values(&self) -> &[f64] {
        &self.diagonal
    }

    #[inline]
    fn scale_into(d: &[f64], alpha: f64, x: &[f64], beta: f64, offset: usize, out: &mut [f64]) {
        let end = offset + out.len();
        for ((v, &a), &w) in out.iter_mut().zip(&x[offset..end]).zip(&d[offset..end]) {
            *v = if beta == 0.0 {
                alpha * w * a
            } else {
                alpha * w * a + beta * *v
            };
        }
    }
}

impl Operator for DiagonalMatrix {
    type Tag = DiagonalTag;

    fn rows(&self) -> usize {
        self.diagonal.len()
    }

    fn cols(&self) -> usize {
        self.diagonal.len()
    }

    fn is_symmetric(&self) -> bool {
        true
    }
}

impl<E: ExecutionEngine> MatVec<HostVector<E>> for DiagonalMatrix {
    fn gemv_scaled(
        &self,
        alpha: f64,
        x: &HostVector<E>,
        beta: f64,
        y: &mut HostVector<E>,
    ) -> VResult<(), HostVector<E>> {
        check_dims(self, "gemv", x.len(), y.len())?;
        let (d, xs) = (self.values(), x.as_slice());
        y.update_chunks(|offset, chunk| Self::scale_into(d, alpha, xs, beta, offset, chunk));
        Ok(())
    }
}

impl MatVec<DeviceVector> for DiagonalMatrix {
    fn gemv_scaled(
        &self,
        alpha: f64,
        x: &DeviceVector,
        beta: f64,
        y: &mut DeviceVector,
    ) -> VResult<(), DeviceVector> {
        check_dims(self, "gemv", x.len(), y.len())?;
        let (d, xs) = (self.values(), x.device_slice());
        y.launch(|offset, block| Self::scale_into(d, alpha, xs, beta, offset, block));
        Ok(())
    }
}

impl<E: ExecutionEngine> WeightedDot<HostVector<E>> for DiagonalMatrix {
    fn weighted_dot_superacc(
        &self,
        x: &HostVector<E>,
        y: &HostVector<E>,
    ) -> VResult<Superaccumulator, HostVector<E>> {
        check_dims(self, "weighted_dot", y.len(), x.len())?;
        Ok(x
            .engine()
            .exact_dot3_superacc(x.as_slice(), self.values(), y.as_slice()))
    }

    fn weighted_fast_dot(&self, x: &HostVector<E>, y: &HostVector<E>) -> VResult<f64, HostVector<E>> {
        check_dims(self, "weighted_dot", y.len(), x.len())?;
        Ok(x.engine().fast_dot3(x.as_slice(), self.values(), y.as_slice()))
    }
}

impl WeightedDot<DeviceVector> for DiagonalMatrix {
    fn weighted_dot_superacc(
        &self,
        x: &DeviceVector,
        y: &DeviceVector,
    ) -> VResult<Superaccumulator, DeviceVector> {
        check_dims(self, "weighted_dot", y.len(), x.len())?;
        Ok(x
            .engine()
            .exact_dot3_superacc(x.device_slice(), self.values(), y.device_slice()))
    }

    fn weighted_fast_dot(&self, x: &DeviceVector, y: &DeviceVector) -> VResult<f64, DeviceVector> {
        check_dims(self, "weighted_dot", y.len(), x.len())?;
        Ok(x
            .engine()
            .fast_dot3(x.device_slice(), self.values(), y.device_slice()))
    }
}
