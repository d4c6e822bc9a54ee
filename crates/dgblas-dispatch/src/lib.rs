//! Tag-dispatched linear algebra over heterogeneous containers
//!
//! Containers (host vectors, device vectors, recursive block containers)
//! implement one trait per operation family. The free functions in
//! [`blas1`] and [`blas2`] and the [`ConjugateGradient`] solver are written
//! once against those traits; adding a backend means adding a container type
//! and its trait impls, never touching a call site.
//!
//! Every dot product is exact: the result is the correctly rounded value of
//! the real inner product, independent of engine, chunking and block layout.
//!
//! # Example
//!
//! ```rust
//! use dgblas_dispatch::prelude::*;
//! use dgblas_core::execution::scalar_sequential;
//!
//! let x = HostVector::from_vec(scalar_sequential(), vec![1e16, 1.0, -1e16]);
//! let y = HostVector::from_vec(scalar_sequential(), vec![1.0; 3]);
//! assert_eq!(blas1::dot(&x, &y).unwrap(), 1.0);
//! ```

pub mod blas1;
pub mod blas2;
pub mod container;
pub mod device;
pub mod matrix;
pub mod solver;
pub mod traits;
pub mod transfer;
pub mod vector;

pub use blas2::DotMode;
pub use container::Container;
pub use device::DeviceVector;
pub use matrix::{Boundary, CsrMatrix, DenseMatrix, DiagonalMatrix, StencilMatrix};
pub use solver::ConjugateGradient;
pub use traits::{
    ElementwiseOp, ExactReduce, HostAccess, MatVec, Operator, RowKernel, VResult, Vector,
    WeightedDot,
};
pub use transfer::{transfer, DefaultEngine, NewLeaf, Transfer};
pub use vector::HostVector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{blas1, blas2};
    pub use crate::{
        transfer, Boundary, ConjugateGradient, Container, CsrMatrix, DenseMatrix, DeviceVector,
        DiagonalMatrix, DotMode, ElementwiseOp, ExactReduce, HostAccess, HostVector, MatVec,
        Operator, StencilMatrix, Transfer, Vector, WeightedDot,
    };
}
