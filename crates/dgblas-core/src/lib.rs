//! Core building blocks for reproducible linear algebra
//!
//! This crate provides the numerical kernel of the dgblas workspace: exact
//! reductions whose result does not depend on summation order, backend,
//! chunking or thread count.
//!
//! # Architecture Overview
//!
//! 1. **Error-free transformations** (`eft`) - products and sums split into a
//!    rounded result and its exact error
//! 2. **Superaccumulator** (`superacc`) - fixed-point exact sum of doubles,
//!    with a small expansion cache (`expansion`) in front of it
//! 3. **Primitives** (`primitives`) - scalar and lane backends running the
//!    reduction inner loops
//! 4. **Execution engines** (`execution`) - sequential, rayon-parallel and
//!    block-structured device execution with exact partial merging
//!
//! Capability tags (`tags`) name the execution model of every container
//! built on top of an engine.
//!
//! # Example
//!
//! ```rust
//! use dgblas_core::{execution::scalar_sequential, ExecutionEngine};
//!
//! let engine = scalar_sequential();
//! let x = vec![1e16, 1.0, -1e16];
//! let y = vec![1.0; 3];
//! let dot = engine.exact_dot_superacc(&x, &y).round();
//! assert_eq!(dot, 1.0);
//! ```

pub mod config;
pub mod eft;
pub mod error;
pub mod execution;
pub mod exdot;
pub mod expansion;
pub mod primitives;
pub mod superacc;
pub mod tags;

// Re-export core types
pub use config::ExecutionConfig;
pub use error::{check_same_len, Error, Result};

pub use execution::{
    auto_engine, lane_sequential, scalar_sequential, with_configured_engine, DeviceBuffer,
    DeviceEngine, EngineVisitor, ExecutionEngine, ExecutionStrategy, SequentialEngine,
};
#[cfg(feature = "parallel")]
pub use execution::{lane_parallel, scalar_parallel, ParallelEngine};

pub use exdot::{exact_dot, exact_dot3, exact_dot3_superacc, exact_dot_superacc, exact_sum};
pub use expansion::Expansion;
pub use primitives::{LaneBackend, ReductionPrimitives, ScalarBackend};
pub use superacc::Superaccumulator;
pub use tags::{
    BlockTag, ContainerTag, DenseTag, DeviceTag, DiagonalTag, DistributedMatrixTag,
    DistributedTag, HostResident, LocalTag, MatrixTag, SerialTag, SharedMemoryTag, SparseTag,
    StencilTag,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        exact_dot, exact_dot3, exact_sum, ContainerTag, Error, ExecutionConfig, ExecutionEngine,
        MatrixTag, ReductionPrimitives, Result, Superaccumulator,
    };
}
