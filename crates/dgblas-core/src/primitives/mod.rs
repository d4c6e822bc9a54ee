//! Reduction primitives with compile-time backend dispatch
//!
//! - `ReductionPrimitives` trait holding the inner reduction loops
//! - Concrete backend types: `ScalarBackend`, `LaneBackend`
//! - Backends are plain `Copy` types; engines are generic over them, so the
//!   choice is resolved at compile time with no dynamic dispatch
//! - Both backends check for an exact fused multiply-add when they are built
//!
//! # Usage
//!
//! ```rust
//! use dgblas_core::primitives::{LaneBackend, ReductionPrimitives};
//! use dgblas_core::Superaccumulator;
//!
//! let backend = LaneBackend::new();
//! let mut acc = Superaccumulator::new();
//! backend.accumulate_dot(&[1e16, 1.0, -1e16], &[1.0, 1.0, 1.0], &mut acc);
//! assert_eq!(acc.round(), 1.0);
//! ```

pub mod backends;
pub mod traits;

pub use backends::{LaneBackend, ScalarBackend};
pub use traits::{product3_terms, ReductionPrimitives};
