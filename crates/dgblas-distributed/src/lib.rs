//! Distributed containers and partition-independent exact reductions
//!
//! A [`DistributedVector`] splits a global vector across the ranks of a
//! process group. Dot products on it reduce each local slice exactly, merge
//! the superaccumulators up a binomial tree and broadcast the canonical
//! total, so every rank gets the same bits, and those bits do not depend on
//! how the vector was split.
//!
//! Process groups are abstracted by [`Communicator`]. [`ThreadComm`] runs a
//! group on threads of one process; [`SelfComm`] is a group of one.
//!
//! # Example
//!
//! ```rust
//! use dgblas_core::execution::scalar_sequential;
//! use dgblas_dispatch::HostVector;
//! use dgblas_distributed::{distributed_dot, DistributedVector, Partition, ThreadComm};
//! use std::sync::Arc;
//!
//! let x = [1e16, 1.0, -1e16];
//! let dots = ThreadComm::run(2, |comm| {
//!     let p = Arc::new(Partition::balanced(3, 2));
//!     let make = |s: &[f64]| HostVector::from_slice(scalar_sequential(), s);
//!     let v = DistributedVector::scatter(&x, p.clone(), comm.clone(), make).unwrap();
//!     let ones = DistributedVector::scatter(&[1.0; 3], p, comm, make).unwrap();
//!     distributed_dot(&v, &ones).unwrap()
//! });
//! assert_eq!(dots, vec![1.0, 1.0]);
//! ```
//!
//! Collectives block, and every rank must issue them in the same order.

pub mod collectives;
pub mod comm;
pub mod error;
pub mod matrix;
pub mod reduce;
pub mod vector;

pub use collectives::{
    all_gather_f64, all_gather_usize, all_reduce_sum_f64, all_reduce_superacc, barrier,
    broadcast_bytes,
};
pub use comm::{Communicator, GroupId, SelfComm, ThreadComm};
pub use error::{Error, Result};
pub use matrix::{DistributedDiagonal, DistributedMatrix};
pub use reduce::{
    distributed_dot, distributed_dot3, distributed_dot3_superacc, distributed_dot_superacc,
    distributed_fast_dot, distributed_fast_dot3,
};
pub use vector::{DistributedVector, Layout, Partition};
