//! Reproducible linear algebra for discontinuous Galerkin codes
//!
//! Facade over the workspace crates:
//!
//! - [`dgblas_core`]: error-free transformations, the superaccumulator, reduction
//!   backends and execution engines
//! - [`dgblas_dispatch`]: host, device and block containers with level-1 and
//!   level-2 operations, `transfer` and a conjugate gradient solver
//! - [`dgblas_distributed`]: process groups, distributed containers and operators,
//!   partition-independent reductions
//!
//! Every dot product returns the correctly rounded value of the exact sum,
//! so results are bit-identical across engines, thread counts, device block
//! sizes and process partitions.
//!
//! ```rust
//! use dgblas::prelude::*;
//! use dgblas::dgblas_core::execution::scalar_sequential;
//!
//! let x = HostVector::from_vec(scalar_sequential(), vec![1e16, 1.0, -1e16]);
//! let ones = HostVector::from_vec(scalar_sequential(), vec![1.0; 3]);
//! assert_eq!(blas1::dot(&x, &ones).unwrap(), 1.0);
//! ```

pub use dgblas_core;
pub use dgblas_dispatch;
pub use dgblas_distributed;

/// Prelude for convenient imports
pub mod prelude {
    pub use dgblas_core::prelude::*;
    pub use dgblas_dispatch::prelude::*;
    pub use dgblas_distributed::{
        distributed_dot, Communicator, DistributedMatrix, DistributedVector, Partition, SelfComm,
        ThreadComm,
    };
}
