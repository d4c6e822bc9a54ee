//! Linear operators
//!
//! Dense, sparse and stencil operators evaluate one output row at a time
//! through [`RowKernel`]; the impls in this module turn any row kernel into a
//! [`MatVec`] and [`WeightedDot`] for every local container. Diagonal
//! operators have their own kernels in [`diagonal`]. Block containers apply
//! the operator to each leaf.

mod csr;
mod dense;
mod diagonal;
mod stencil;

pub use csr::CsrMatrix;
pub use dense::DenseMatrix;
pub use diagonal::DiagonalMatrix;
pub use stencil::{Boundary, StencilMatrix};

use crate::container::Container;
use crate::device::DeviceVector;
use crate::traits::{ExactReduce, HostAccess, MatVec, Operator, RowKernel, VResult, Vector, WeightedDot};
use crate::vector::HostVector;
use dgblas_core::{Error, ExecutionEngine, Superaccumulator};
use tracing::trace;

/// Check that `M·x` fits into `y`
pub(crate) fn check_dims<M: Operator + ?Sized>(
    m: &M,
    operation: &'static str,
    x_len: usize,
    y_len: usize,
) -> Result<(), Error> {
    if m.cols() != x_len || m.rows() != y_len {
        return Err(Error::dimension_mismatch(
            operation,
            m.rows(),
            m.cols(),
            x_len,
            y_len,
        ));
    }
    Ok(())
}

#[inline]
fn row_update(m: &impl RowKernel, alpha: f64, x: &[f64], beta: f64, offset: usize, out: &mut [f64]) {
    for (k, v) in out.iter_mut().enumerate() {
        let r = m.row_dot(offset + k, x);
        *v = if beta == 0.0 { alpha * r } else { alpha * r + beta * *v };
    }
}

impl<M: RowKernel, E: ExecutionEngine> MatVec<HostVector<E>> for M {
    fn gemv_scaled(
        &self,
        alpha: f64,
        x: &HostVector<E>,
        beta: f64,
        y: &mut HostVector<E>,
    ) -> VResult<(), HostVector<E>> {
        check_dims(self, "gemv", x.len(), y.len())?;
        trace!(operator = %self.describe(), "host gemv");
        let xs = x.as_slice();
        y.update_chunks(|offset, chunk| row_update(self, alpha, xs, beta, offset, chunk));
        Ok(())
    }
}

impl<M: RowKernel> MatVec<DeviceVector> for M {
    fn gemv_scaled(
        &self,
        alpha: f64,
        x: &DeviceVector,
        beta: f64,
        y: &mut DeviceVector,
    ) -> VResult<(), DeviceVector> {
        check_dims(self, "gemv", x.len(), y.len())?;
        let xs = x.device_slice();
        y.launch(|offset, block| row_update(self, alpha, xs, beta, offset, block));
        Ok(())
    }
}

impl<M: RowKernel, E: ExecutionEngine> WeightedDot<HostVector<E>> for M {
    fn weighted_dot_superacc(
        &self,
        x: &HostVector<E>,
        y: &HostVector<E>,
    ) -> VResult<Superaccumulator, HostVector<E>> {
        check_dims(self, "weighted_dot", y.len(), x.len())?;
        let mut my = HostVector::zeros(y.engine().clone(), self.rows());
        self.gemv(y, &mut my)?;
        x.dot_superacc(&my)
    }

    fn weighted_fast_dot(&self, x: &HostVector<E>, y: &HostVector<E>) -> VResult<f64, HostVector<E>> {
        check_dims(self, "weighted_dot", y.len(), x.len())?;
        let mut my = HostVector::zeros(y.engine().clone(), self.rows());
        self.gemv(y, &mut my)?;
        x.fast_dot(&my)
    }
}

impl<M: RowKernel> WeightedDot<DeviceVector> for M {
    fn weighted_dot_superacc(
        &self,
        x: &DeviceVector,
        y: &DeviceVector,
    ) -> VResult<Superaccumulator, DeviceVector> {
        check_dims(self, "weighted_dot", y.len(), x.len())?;
        let mut my = DeviceVector::zeros(y.engine().clone(), self.rows());
        self.gemv(y, &mut my)?;
        x.dot_superacc(&my)
    }

    fn weighted_fast_dot(&self, x: &DeviceVector, y: &DeviceVector) -> VResult<f64, DeviceVector> {
        check_dims(self, "weighted_dot", y.len(), x.len())?;
        let mut my = DeviceVector::zeros(y.engine().clone(), self.rows());
        self.gemv(y, &mut my)?;
        x.fast_dot(&my)
    }
}

fn block_mismatch<V: Vector>(operation: &str, x: &Container<V>, y: &Container<V>) -> Error {
    Error::ShapeMismatch(format!(
        "{operation}: operand block structures differ ({} vs {} blocks)",
        x.num_blocks(),
        y.num_blocks()
    ))
}

impl<M, V> MatVec<Container<V>> for M
where
    M: MatVec<V>,
    V: Vector,
{
    fn gemv_scaled(
        &self,
        alpha: f64,
        x: &Container<V>,
        beta: f64,
        y: &mut Container<V>,
    ) -> VResult<(), Container<V>> {
        match (x, y) {
            (Container::Leaf(x), Container::Leaf(y)) => {
                MatVec::<V>::gemv_scaled(self, alpha, x, beta, y)
            }
            (Container::Blocks(xs), Container::Blocks(ys)) if xs.len() == ys.len() => {
                for (x, y) in xs.iter().zip(ys.iter_mut()) {
                    MatVec::<Container<V>>::gemv_scaled(self, alpha, x, beta, y)?;
                }
                Ok(())
            }
            (x, y) => Err(block_mismatch("gemv", x, y).into()),
        }
    }

    fn check_operands(&self, x: &Container<V>, y: &Container<V>) -> VResult<(), Container<V>> {
        let mut checks = Vec::new();
        if !x.zip_leaves(y, &mut |a, b| MatVec::<V>::check_operands(self, a, b), &mut checks) {
            return Err(block_mismatch("gemv", x, y).into());
        }
        checks.into_iter().collect()
    }
}

impl<M, V> WeightedDot<Container<V>> for M
where
    M: WeightedDot<V>,
    V: Vector,
{
    fn weighted_dot_superacc(
        &self,
        x: &Container<V>,
        y: &Container<V>,
    ) -> VResult<Superaccumulator, Container<V>> {
        let mut partials = Vec::new();
        if !x.zip_leaves(y, &mut |a, b| WeightedDot::<V>::weighted_dot_superacc(self, a, b), &mut partials) {
            return Err(block_mismatch("weighted_dot", x, y).into());
        }
        let mut total = Superaccumulator::new();
        for partial in partials {
            total.merge(&partial?);
        }
        Ok(total)
    }

    fn weighted_fast_dot(&self, x: &Container<V>, y: &Container<V>) -> VResult<f64, Container<V>> {
        let mut partials = Vec::new();
        if !x.zip_leaves(y, &mut |a, b| WeightedDot::<V>::weighted_fast_dot(self, a, b), &mut partials) {
            return Err(block_mismatch("weighted_dot", x, y).into());
        }
        partials.into_iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dgblas_core::execution::{lane_sequential, scalar_sequential};

    #[test]
    fn test_check_dims() {
        let m = DenseMatrix::identity(3);
        assert!(check_dims(&m, "gemv", 3, 3).is_ok());
        assert!(check_dims(&m, "gemv", 2, 3).is_err());
        assert!(check_dims(&m, "gemv", 3, 4).is_err());
    }

    #[test]
    fn test_rectangular_gemv() {
        let m = DenseMatrix::new(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let x = HostVector::from_slice(scalar_sequential(), &[1.0, 0.0, -1.0]);
        let mut y = HostVector::from_slice(scalar_sequential(), &[f64::NAN, f64::INFINITY]);
        m.gemv(&x, &mut y).unwrap();
        assert_eq!(y.as_slice(), &[-2.0, -2.0]);

        m.gemv_scaled(0.5, &x, -1.0, &mut y).unwrap();
        assert_eq!(y.as_slice(), &[1.0, 1.0]);
        assert!(m.gemv(&y, &mut y.clone()).is_err());
    }

    #[test]
    fn test_chunked_gemv_matches_serial() {
        let m = StencilMatrix::laplacian_1d(17, 0.1, Boundary::Periodic).unwrap();
        let values: Vec<f64> = (0..17).map(|i| (i as f64 * 0.37).sin()).collect();
        let x1 = HostVector::from_slice(scalar_sequential().with_chunk_size(3), &values);
        let x2 = HostVector::from_slice(lane_sequential(), &values);
        let mut y1 = HostVector::zeros(x1.engine().clone(), 17);
        let mut y2 = HostVector::zeros(x2.engine().clone(), 17);
        m.gemv(&x1, &mut y1).unwrap();
        m.gemv(&x2, &mut y2).unwrap();
        assert_eq!(y1.as_slice(), y2.as_slice());
    }

    #[test]
    fn test_weighted_dot_row_kernel() {
        let m = CsrMatrix::from_triplets(2, 2, &[(0, 0, 2.0), (0, 1, 1.0), (1, 1, 3.0)]).unwrap();
        let x = HostVector::from_slice(scalar_sequential(), &[1.0, 2.0]);
        let y = HostVector::from_slice(scalar_sequential(), &[3.0, 4.0]);
        // M·y = (10, 12); x·(M·y) = 34
        assert_eq!(m.weighted_dot_superacc(&x, &y).unwrap().round(), 34.0);
        assert_eq!(m.weighted_fast_dot(&x, &y).unwrap(), 34.0);
    }

    #[test]
    fn test_block_gemv_per_leaf() {
        let e = scalar_sequential();
        let m = DiagonalMatrix::new(vec![2.0, 3.0]);
        let x = Container::from_leaves([
            HostVector::from_slice(e.clone(), &[1.0, 1.0]),
            HostVector::from_slice(e.clone(), &[2.0, 2.0]),
        ]);
        let mut y = Container::from_leaves([HostVector::zeros(e.clone(), 2), HostVector::zeros(e.clone(), 2)]);
        m.gemv(&x, &mut y).unwrap();
        let leaves: Vec<Vec<f64>> = y.leaves().iter().map(|v| v.to_vec()).collect();
        assert_eq!(leaves, vec![vec![2.0, 3.0], vec![4.0, 6.0]]);
        assert_eq!(m.weighted_dot_superacc(&x, &x).unwrap().round(), 5.0 + 20.0);

        let mut wrong = Container::leaf(HostVector::zeros(e, 2));
        assert!(matches!(m.gemv(&x, &mut wrong), Err(Error::ShapeMismatch(_))));
    }
}
