//! Backend implementations
//!
//! Concrete backend types with direct implementations. No Box, no dyn.

pub mod lanes;
pub mod scalar;

pub use lanes::LaneBackend;
pub use scalar::ScalarBackend;
