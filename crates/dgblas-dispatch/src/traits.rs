//! Operation traits
//!
//! One trait per operation family, implemented once per container type. A
//! call site that is generic over these traits works unchanged for every
//! container; a container that lacks an implementation is rejected by the
//! compiler rather than at runtime.

use dgblas_core::{ContainerTag, MatrixTag, Superaccumulator};

/// Common surface of every container
pub trait Vector: Clone + Send + Sync {
    /// Capability tag of the container
    type Tag: ContainerTag;

    /// Error produced by operations on this container
    ///
    /// Local containers use [`dgblas_core::Error`]; containers that
    /// communicate have their own error type that wraps it.
    type Error: std::error::Error + From<dgblas_core::Error> + Send + Sync + 'static;

    /// Number of (global) elements
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of an operation on container `V`
pub type VResult<T, V> = std::result::Result<T, <V as Vector>::Error>;

/// Containers whose local data is an ordinary host slice
pub trait HostAccess {
    fn as_slice(&self) -> &[f64];
    fn as_mut_slice(&mut self) -> &mut [f64];
}

/// Elementwise updates; `self` is both the output and the first input
pub trait ElementwiseOp: Vector {
    /// `self[i] = f(self[i])`
    fn apply<F>(&mut self, f: F)
    where
        F: Fn(f64) -> f64 + Sync + Send;

    /// `self[i] = f(self[i], x[i])`
    fn apply_with<F>(&mut self, x: &Self, f: F) -> VResult<(), Self>
    where
        F: Fn(f64, f64) -> f64 + Sync + Send;

    /// `self[i] = f(self[i], x1[i], x2[i])`
    fn apply_with2<F>(&mut self, x1: &Self, x2: &Self, f: F) -> VResult<(), Self>
    where
        F: Fn(f64, f64, f64) -> f64 + Sync + Send;

    /// `self[i] = value`
    fn fill(&mut self, value: f64) {
        self.apply(move |_| value);
    }
}

/// Reductions over containers
///
/// The superaccumulator returned by the exact forms already covers the whole
/// container, including parts owned by other processes.
pub trait ExactReduce: Vector {
    /// Exact Σ self[i]·y[i]
    fn dot_superacc(&self, y: &Self) -> VResult<Superaccumulator, Self>;

    /// Exact Σ self[i]·y[i]·z[i]
    fn dot3_superacc(&self, y: &Self, z: &Self) -> VResult<Superaccumulator, Self>;

    /// Ordinary floating-point Σ self[i]·y[i]
    fn fast_dot(&self, y: &Self) -> VResult<f64, Self>;

    /// Ordinary floating-point Σ self[i]·y[i]·z[i]
    fn fast_dot3(&self, y: &Self, z: &Self) -> VResult<f64, Self>;
}

/// Shape and properties of a linear operator
pub trait Operator: Send + Sync {
    /// Storage format of the operator
    type Tag: MatrixTag;

    fn rows(&self) -> usize;
    fn cols(&self) -> usize;

    /// Symmetry, determined at construction
    fn is_symmetric(&self) -> bool;

    /// Short description for diagnostics
    fn describe(&self) -> String {
        format!("{} {}x{}", <Self::Tag as MatrixTag>::NAME, self.rows(), self.cols())
    }
}

/// Operators that compute a single output row from a dense input slice
///
/// Each row is evaluated in a fixed entry order, so a row produces the same
/// bits regardless of which worker evaluates it.
pub trait RowKernel: Operator {
    /// `Σ_j A[row, j]·x[j]`
    fn row_dot(&self, row: usize, x: &[f64]) -> f64;
}

/// Matrix-vector products `y = alpha·M·x + beta·y`
pub trait MatVec<V: Vector>: Operator {
    /// `y = M·x`
    fn gemv(&self, x: &V, y: &mut V) -> VResult<(), V> {
        self.gemv_scaled(1.0, x, 0.0, y)
    }

    /// `y = alpha·M·x + beta·y`; `beta == 0` ignores the old contents of `y`
    fn gemv_scaled(&self, alpha: f64, x: &V, beta: f64, y: &mut V) -> VResult<(), V>;

    /// Check that `x` and `y` fit the operator without applying it
    fn check_operands(&self, x: &V, y: &V) -> VResult<(), V> {
        crate::matrix::check_dims(self, "gemv", x.len(), y.len()).map_err(Into::into)
    }
}

/// Weighted inner products `x^T·M·y`
pub trait WeightedDot<V: Vector>: Operator {
    /// Exact `x^T·M·y`
    fn weighted_dot_superacc(&self, x: &V, y: &V) -> VResult<Superaccumulator, V>;

    /// Ordinary floating-point `x^T·M·y`
    fn weighted_fast_dot(&self, x: &V, y: &V) -> VResult<f64, V>;
}
