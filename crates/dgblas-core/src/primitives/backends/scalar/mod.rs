//! Scalar backend implementation
//!
//! One element per step, straight into the superaccumulator. Used as the
//! reference the other backends are tested against.

use crate::error::{Error, Result};
use crate::primitives::ReductionPrimitives;

/// Scalar backend
///
/// Products are split with the fused multiply-add error-free product, so the
/// backend can only be built on hosts where that split is exact.
#[derive(Clone, Copy, Debug)]
pub struct ScalarBackend(());

impl ScalarBackend {
    /// Create a new scalar backend
    ///
    /// # Panics
    /// Panics if fused multiply-add is not correctly rounded on this host
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        match Self::try_new() {
            Ok(backend) => backend,
            Err(e) => panic!("{e}"),
        }
    }

    /// Create a new scalar backend, reporting a missing capability as an error
    pub fn try_new() -> Result<Self> {
        Self::with_fma_check(crate::eft::fma_is_exact)
    }

    /// Create a new scalar backend gated on a custom capability check
    pub fn with_fma_check(check: impl FnOnce() -> bool) -> Result<Self> {
        if !check() {
            return Err(Error::FeatureNotAvailable(
                "scalar backend requires a correctly rounded fused multiply-add".to_string(),
            ));
        }
        Ok(Self(()))
    }
}

impl ReductionPrimitives for ScalarBackend {
    fn backend_name(&self) -> &'static str {
        "scalar"
    }

    // All operations use the default implementations from the trait
}
